//! Handler for `modgraph insight`.

use std::path::{Path, PathBuf};

use miette::Result;

use modgraph_ops::ops_insight::{self, InsightOptions};

pub fn exec(catalog: &Path, module: &str, config: Option<PathBuf>) -> Result<()> {
    ops_insight::insight(catalog, module, &InsightOptions { config })
}
