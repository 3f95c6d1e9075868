pub mod image_stack;
pub mod layout;

use crate::mrc::Page;
use crate::telemetry::context::PageContext;

/// Supplies pages to the job runner. Pages are loaded on worker threads, so
/// implementations must be shareable.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Load the page at 0-based `index`, recording load timings in `ctx`.
    fn load_page(&self, index: usize, ctx: &mut PageContext) -> crate::error::Result<Page>;
}
