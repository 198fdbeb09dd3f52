//! Command-line arguments for `calltree`.

use std::path::PathBuf;

use calltree_core::SortProperty;
use clap::{Parser, ValueEnum};

/// Column to sort the tree by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortColumn {
    /// Time spent in the function itself
    #[value(name = "self")]
    SelfTime,
    /// Time spent in the function and its callees
    Total,
    /// Function name
    Name,
    /// Script URL
    Url,
}

impl From<SortColumn> for SortProperty {
    fn from(column: SortColumn) -> Self {
        match column {
            SortColumn::SelfTime => SortProperty::SelfTime,
            SortColumn::Total => SortProperty::TotalTime,
            SortColumn::Name => SortProperty::FunctionName,
            SortColumn::Url => SortProperty::Url,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "calltree")]
#[command(version)]
#[command(about = "Print the aggregated call tree of a CPU profile", long_about = None)]
pub struct Cli {
    /// Profile to load: a V8 .cpuprofile or a JSON call tree
    #[arg(value_name = "PROFILE")]
    pub profile: PathBuf,

    /// Sort every level by this column
    #[arg(short, long, value_enum)]
    pub sort: Option<SortColumn>,

    /// Sort ascending instead of descending
    #[arg(short, long, requires = "sort")]
    pub ascending: bool,

    /// Show only the first call to this callUID, percentages relative to it
    #[arg(short, long, value_name = "CALL_UID")]
    pub focus: Option<String>,

    /// Hide calls to this callUID, charging their time to the callers (repeatable)
    #[arg(short = 'x', long, value_name = "CALL_UID")]
    pub exclude: Vec<String>,

    /// Highlight and reveal rows matching a query: `>5ms`, `<=2%`, `1.5s` or text
    #[arg(short = 'q', long, value_name = "QUERY")]
    pub search: Option<String>,

    /// Match text queries case-sensitively
    #[arg(long, requires = "search")]
    pub case_sensitive: bool,

    /// Treat text queries as regular expressions
    #[arg(long, requires = "search")]
    pub regex: bool,

    /// Expand the tree this many levels below the top level
    #[arg(short, long, default_value_t = 2)]
    pub depth: usize,

    /// Log tree operations to stderr (overrides RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "calltree",
            "app.cpuprofile",
            "--sort",
            "self",
            "--ascending",
            "-x",
            "gc@:0:0",
            "-x",
            "(program)@:0:0",
            "--search",
            ">5ms",
            "--depth",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.sort, Some(SortColumn::SelfTime));
        assert!(cli.ascending);
        assert_eq!(cli.exclude.len(), 2);
        assert_eq!(cli.search.as_deref(), Some(">5ms"));
        assert_eq!(cli.depth, 4);
        assert_eq!(SortProperty::from(SortColumn::Total), SortProperty::TotalTime);
    }

    #[test]
    fn search_flags_need_a_query() {
        assert!(Cli::try_parse_from(["calltree", "p.json", "--regex"]).is_err());
        assert!(Cli::try_parse_from(["calltree", "p.json", "--ascending"]).is_err());
    }
}
