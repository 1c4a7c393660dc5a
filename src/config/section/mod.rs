//! Configuration section definitions.
//!
//! Each module corresponds to a section in `mdxc.toml`:
//!
//! | Module    | TOML Section | Purpose                                   |
//! |-----------|--------------|-------------------------------------------|
//! | `content` | `[content]`  | Source tree, extension, front matter defaults |
//! | `cache`   | `[cache]`    | Artifact directory and index file name    |
//! | `workers` | `[workers]`  | Pool size, timeout, retries, isolation    |

mod cache;
mod content;
mod workers;

pub use cache::CacheConfig;
pub use content::ContentConfig;
pub use workers::{Isolation, WorkersConfig, cpu_count};
