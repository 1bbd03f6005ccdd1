pub mod detector;
pub mod framework;

pub use detector::{NavigationDetector, NavigationOccurred};
pub use framework::{FrameworkRegistry, FrameworkStrategy};
