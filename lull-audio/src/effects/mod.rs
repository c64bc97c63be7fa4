//! In-place processors backing gain and filter nodes

mod filter;
mod gain;

pub use filter::{Filter, FilterType};
pub use gain::Gain;

/// A mono processor applied block by block
pub trait Effect: Send {
    fn process(&mut self, samples: &mut [f32]);

    /// Forget any signal history
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}
