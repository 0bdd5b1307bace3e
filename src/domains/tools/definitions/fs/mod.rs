//! Filesystem tools, all confined by the path sandbox.

pub mod read;
pub mod scan_dir;
pub mod write;

pub use read::FileReadTool;
pub use scan_dir::DirScanTool;
pub use write::FileWriteTool;
