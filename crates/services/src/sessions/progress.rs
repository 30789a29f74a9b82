/// How far a location session has got through its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn new(total: usize, completed: usize) -> Self {
        let completed = completed.min(total);
        Self {
            total,
            completed,
            remaining: total - completed,
            is_complete: completed == total,
        }
    }

    /// Completed share in whole percent, rounded down.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        u8::try_from(self.completed * 100 / self.total).unwrap_or(100)
    }
}
