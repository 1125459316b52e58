//! Fuzz target for include path parsing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_include_tree
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use weave_query::IncludeTree;

/// Include paths assembled from a handful of segments.
#[derive(Debug, Arbitrary)]
struct FuzzInclude {
    paths: Vec<Vec<String>>,
}

impl FuzzInclude {
    fn to_param(&self) -> String {
        self.paths
            .iter()
            .map(|segments| segments.join("."))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fuzz_target!(|input: FuzzInclude| {
    let raw = input.to_param();
    if let Ok(tree) = IncludeTree::parse(&raw) {
        // Parsing a tree's own keys again must succeed.
        let keys: Vec<&str> = tree.keys().collect();
        let _ = IncludeTree::parse(&keys.join(","));
    }
});
