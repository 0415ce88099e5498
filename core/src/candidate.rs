//! Paginated candidate set.
//!
//! Candidates are laid out 9 per page, matching the nine digit keys. Paging
//! wraps in both directions. Entries equal to `"*"` are placeholders: they keep
//! their slot so the remaining entries stay under their usual key, but they are
//! shown blank and cannot be picked.

/// Number of candidates per page.
pub const PAGE_SIZE: usize = 9;

/// Placeholder entry shown as an empty slot.
pub const PLACEHOLDER: &str = "*";

/// A paginated list of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    /// All available candidates
    candidates: Vec<String>,

    /// Current page index (0-based)
    current_page: usize,
}

impl CandidateList {
    /// Create a new empty candidate list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a candidate list positioned on the first page.
    pub fn from_candidates(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            current_page: 0,
        }
    }

    /// Get all candidates.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Get the total number of pages.
    pub fn num_pages(&self) -> usize {
        self.candidates.len().div_ceil(PAGE_SIZE)
    }

    /// Get the current page index (0-based).
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// True when there is more than one page to flip through.
    pub fn is_paged(&self) -> bool {
        self.candidates.len() > PAGE_SIZE
    }

    /// Advance one page, wrapping from the last page to the first.
    pub fn next_page(&mut self) {
        let pages = self.num_pages();
        if pages > 0 {
            self.current_page = (self.current_page + 1) % pages;
        }
    }

    /// Go back one page, wrapping from the first page to the last.
    pub fn prev_page(&mut self) {
        let pages = self.num_pages();
        if pages > 0 {
            self.current_page = (self.current_page + pages - 1) % pages;
        }
    }

    /// The nine display slots of the current page; placeholders and slots
    /// past the end are empty strings.
    pub fn page_slots(&self) -> Vec<String> {
        let start = self.current_page * PAGE_SIZE;
        (start..start + PAGE_SIZE)
            .map(|i| match self.candidates.get(i) {
                Some(c) if c != PLACEHOLDER => c.clone(),
                _ => String::new(),
            })
            .collect()
    }

    /// Candidate under key `slot` (1..=9) on the current page.
    ///
    /// Returns `None` for slot 0, slots past the end of the list and
    /// placeholder entries.
    pub fn pick(&self, slot: u8) -> Option<&str> {
        if !(1..=9).contains(&slot) {
            return None;
        }
        let index = self.current_page * PAGE_SIZE + usize::from(slot) - 1;
        self.candidates
            .get(index)
            .map(String::as_str)
            .filter(|c| *c != PLACEHOLDER)
    }

    /// Page indicator such as `2/3頁`, only when there is more than one page.
    pub fn page_label(&self) -> Option<String> {
        self.is_paged()
            .then(|| format!("{}/{}頁", self.current_page + 1, self.num_pages()))
    }

    /// Clear the candidate list.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.current_page = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> CandidateList {
        CandidateList::from_candidates((0..n).map(|i| format!("c{i}")).collect())
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(numbered(0).num_pages(), 0);
        assert_eq!(numbered(9).num_pages(), 1);
        assert_eq!(numbered(10).num_pages(), 2);
        assert_eq!(numbered(20).num_pages(), 3);
    }

    #[test]
    fn paging_wraps_both_ways() {
        let mut list = numbered(20);
        list.prev_page();
        assert_eq!(list.current_page(), 2);
        list.next_page();
        assert_eq!(list.current_page(), 0);
        list.next_page();
        list.next_page();
        list.next_page();
        assert_eq!(list.current_page(), 0);
    }

    #[test]
    fn paging_an_empty_list_is_harmless() {
        let mut list = CandidateList::new();
        list.next_page();
        list.prev_page();
        assert_eq!(list.current_page(), 0);
    }

    #[test]
    fn pick_uses_current_page_offset() {
        let mut list = numbered(20);
        assert_eq!(list.pick(1), Some("c0"));
        list.next_page();
        assert_eq!(list.pick(3), Some("c11"));
        list.next_page();
        assert_eq!(list.pick(2), Some("c19"));
        assert_eq!(list.pick(3), None);
        assert_eq!(list.pick(0), None);
    }

    #[test]
    fn placeholders_are_blank_and_unpickable() {
        let list = CandidateList::from_candidates(vec!["甲".into(), "*".into(), "乙".into()]);
        assert_eq!(list.pick(2), None);
        assert_eq!(list.pick(3), Some("乙"));
        let slots = list.page_slots();
        assert_eq!(slots.len(), PAGE_SIZE);
        assert_eq!(&slots[..3], &["甲", "", "乙"]);
        assert!(slots[3..].iter().all(|s| s.is_empty()));
    }

    #[test]
    fn page_label_only_when_paged() {
        assert_eq!(numbered(9).page_label(), None);
        let mut list = numbered(10);
        list.next_page();
        assert_eq!(list.page_label().as_deref(), Some("2/2頁"));
    }
}
