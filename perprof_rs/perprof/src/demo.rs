//! Bundled example tables used by `--demo`.

use crate::options::TableSource;

const ALPHA: &str = include_str!("../data/alpha.table");
const BETA: &str = include_str!("../data/beta.table");
const GAMMA: &str = include_str!("../data/gamma.table");

pub fn demo_sources() -> Vec<TableSource> {
    vec![
        TableSource::Embedded {
            name: "alpha",
            contents: ALPHA,
        },
        TableSource::Embedded {
            name: "beta",
            contents: BETA,
        },
        TableSource::Embedded {
            name: "gamma",
            contents: GAMMA,
        },
    ]
}
