//! Handler for `modgraph resolve`.

use std::path::PathBuf;

use miette::Result;

use modgraph_ops::ops_resolve::{self, ResolveOptions};

pub fn exec(
    catalog: PathBuf,
    config: Option<PathBuf>,
    lock: Option<PathBuf>,
    write_lock: Option<PathBuf>,
    depth: Option<usize>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let opts = ResolveOptions {
        config,
        lock,
        write_lock,
        depth,
        output,
        json,
    };
    ops_resolve::resolve(&catalog, &opts)
}
