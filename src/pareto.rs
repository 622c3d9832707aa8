/// Decides whether `left` is at least as good as `right` in every criterion.
pub trait ParetoComparator<E> {
    fn dominates(&self, left: &E, right: &E) -> bool;
}

impl<E, F: Fn(&E, &E) -> bool> ParetoComparator<E> for F {
    fn dominates(&self, left: &E, right: &E) -> bool {
        self(left, right)
    }
}

/// A set where no element dominates another.
///
/// The marker splits the set in two: elements added after the last call to
/// [`ParetoSet::mark_at_end_of_set`] can be listed separately, which lets a round
/// process only what changed since the previous round.
#[derive(Debug, Clone)]
pub struct ParetoSet<E> {
    elements: Vec<E>,
    marker: usize,
}

impl<E> Default for ParetoSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ParetoSet<E> {
    pub const fn new() -> Self {
        Self { elements: Vec::new(), marker: 0 }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.elements.iter()
    }

    // Callers must not change the criteria elements are compared on in a way that breaks dominance.
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, E> {
        self.elements.iter_mut()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.elements
    }

    pub fn into_vec(self) -> Vec<E> {
        self.elements
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.marker = 0;
    }

    // Adds an element to the set, discarding dominated elements.
    // Returns true if the element was added <=> the set was modified.
    pub fn add<C: ParetoComparator<E>>(&mut self, element: E, comparator: &C) -> bool {
        // An equal element is rejected, the first one found wins.
        if self.elements.iter().any(|e| comparator.dominates(e, &element)) {
            return false;
        }

        let mut i = 0;
        while i < self.elements.len() {
            if comparator.dominates(&element, &self.elements[i]) {
                self.elements.remove(i);
                if i < self.marker {
                    self.marker -= 1;
                }
            } else {
                i += 1;
            }
        }
        self.elements.push(element);
        true
    }

    pub fn mark_at_end_of_set(&mut self) {
        self.marker = self.elements.len();
    }

    pub fn elements_after_marker(&self) -> &[E] {
        &self.elements[self.marker..]
    }
}

impl<'a, E> IntoIterator for &'a ParetoSet<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
