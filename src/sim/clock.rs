/// A simulation clock counting ticks, optionally up to a fixed budget.
///
/// A budget of `None` never runs out; the caller stops the loop some other
/// way (a cancel flag or an error).
///
/// # Examples
///
/// ```
/// use lvgrid_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut steps = Vec::new();
///
/// clock.run(|step| {
///     steps.push(step);
///     true
/// });
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next tick to hand out
    current: usize,
    /// Tick budget, if any
    total: Option<usize>,
}

impl Clock {
    /// Creates a clock that stops after `total` ticks.
    pub fn new(total: usize) -> Self {
        Self {
            current: 0,
            total: Some(total),
        }
    }

    /// Creates a clock that never runs out of ticks.
    pub fn unbounded() -> Self {
        Self {
            current: 0,
            total: None,
        }
    }

    /// Builds a clock from a step budget where `0` means unbounded.
    pub fn from_budget(steps: usize) -> Self {
        if steps == 0 {
            Self::unbounded()
        } else {
            Self::new(steps)
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The tick number (starting from 0) before advancing
    /// * `None` - If the budget is exhausted
    pub fn tick(&mut self) -> Option<usize> {
        match self.total {
            Some(total) if self.current >= total => None,
            _ => {
                let step = self.current;
                self.current += 1;
                Some(step)
            }
        }
    }

    /// Calls `f` for every remaining tick until it returns `false` or the
    /// budget runs out.
    pub fn run(&mut self, mut f: impl FnMut(usize) -> bool) {
        while let Some(step) = self.tick() {
            if !f(step) {
                break;
            }
        }
    }
}
