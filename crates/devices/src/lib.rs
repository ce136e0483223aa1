//! Device source implementations.
//!
//! Vendor SDK wrappers are external to this workspace; every source
//! here implements the `contracts` traits so managers are wired
//! identically against hardware or simulation. The mock sources
//! generate data at a configurable rate on background threads, driven
//! through the same callback path a vendor SDK would use.

mod mock_bag;
mod mock_gaze;
mod mock_rgbd;

pub use mock_bag::{MockBagProbe, MockBagRecorder, BAG_MAGIC};
pub use mock_gaze::{MockGazeConfig, MockGazeSource};
pub use mock_rgbd::{MockRgbdConfig, MockRgbdSource};
