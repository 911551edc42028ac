//! Handler for `modgraph replay`.

use std::path::Path;

use miette::Result;

use modgraph_ops::ops_replay;

pub fn exec(file: &Path, depth: Option<usize>) -> Result<()> {
    ops_replay::replay(file, depth)
}
