//! Typed filter-graph description.
//!
//! Graphs are assembled from [`FilterChain`]s of [`Filter`]s and only turned
//! into ffmpeg's textual syntax when the command line is built. Argument
//! values carry their escaping rule with them, so a path or a quoted
//! expression cannot accidentally split the graph.

use std::fmt;
use std::path::{Path, PathBuf};

/// A single filter argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Written verbatim. Commas must already be escaped by the caller.
    Raw(String),
    /// Wrapped in single quotes; embedded quotes are escaped.
    Quoted(String),
    /// A file path in quotes, with separators and colons escaped.
    Path(PathBuf),
}

impl ArgValue {
    fn render(&self) -> String {
        match self {
            Self::Raw(value) => value.clone(),
            Self::Quoted(value) => format!("'{}'", value.replace('\'', "\\'")),
            Self::Path(path) => format!("'{}'", escape_filter_path(path)),
        }
    }
}

/// Escape a path for use inside a quoted filter argument.
///
/// Backslashes become forward slashes, `:` and `'` are backslash-escaped.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Format a number for a filter argument: at most six decimals, no
/// trailing zeros.
pub fn num(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" || text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FilterArg {
    key: Option<String>,
    value: ArgValue,
}

/// One filter with its arguments, e.g. `scale=1920:1080`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a positional argument.
    pub fn pos(mut self, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg {
            key: None,
            value: ArgValue::Raw(value.to_string()),
        });
        self
    }

    /// Add a `key=value` argument written verbatim.
    pub fn arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg {
            key: Some(key.to_string()),
            value: ArgValue::Raw(value.to_string()),
        });
        self
    }

    /// Add a `key='value'` argument.
    pub fn quoted(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.push(FilterArg {
            key: Some(key.to_string()),
            value: ArgValue::Quoted(value.into()),
        });
        self
    }

    /// Add a path argument; `None` for the key makes it positional.
    pub fn path(mut self, key: Option<&str>, path: impl Into<PathBuf>) -> Self {
        self.args.push(FilterArg {
            key: key.map(str::to_string),
            value: ArgValue::Path(path.into()),
        });
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            if let Some(key) = &arg.key {
                write!(f, "{key}=")?;
            }
            f.write_str(&arg.value.render())?;
        }
        Ok(())
    }
}

/// A linear chain of filters between labelled pads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain reading from one pad and writing to one pad.
    pub fn link(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            inputs: vec![input.into()],
            filters: Vec::new(),
            outputs: vec![output.into()],
        }
    }

    pub fn input(mut self, pad: impl Into<String>) -> Self {
        self.inputs.push(pad.into());
        self
    }

    pub fn output(mut self, pad: impl Into<String>) -> Self {
        self.outputs.push(pad.into());
        self
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn then_all(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "[{pad}]")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for pad in &self.outputs {
            write!(f, "[{pad}]")?;
        }
        Ok(())
    }
}

/// A complete `-filter_complex` graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn extend(&mut self, chains: impl IntoIterator<Item = FilterChain>) {
        self.chains.extend(chains);
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Names of every filter used, in graph order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.chains
            .iter()
            .flat_map(|chain| chain.filters.iter().map(Filter::name))
            .collect()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_formatting() {
        let filter = Filter::new("scale")
            .pos(1920)
            .pos(1080)
            .arg("force_original_aspect_ratio", "decrease");
        assert_eq!(
            filter.to_string(),
            "scale=1920:1080:force_original_aspect_ratio=decrease"
        );
        assert_eq!(Filter::new("apad").to_string(), "apad");
    }

    #[test]
    fn test_chain_and_graph_formatting() {
        let mut graph = FilterGraph::new();
        graph.push(
            FilterChain::new()
                .then(Filter::new("color").arg("c", "black").arg("s", "1920x1080"))
                .output("base"),
        );
        graph.push(
            FilterChain::link("base", "v")
                .input("1:v")
                .then(Filter::new("overlay").pos(0).pos(0)),
        );
        assert_eq!(
            graph.to_string(),
            "color=c=black:s=1920x1080[base];[base][1:v]overlay=0:0[v]"
        );
        assert_eq!(graph.filter_names(), vec!["color", "overlay"]);
    }

    #[test]
    fn test_path_escaping() {
        let filter = Filter::new("subtitles")
            .path(None, "C:\\clips\\it's.ass")
            .path(Some("fontsdir"), "fonts");
        assert_eq!(
            filter.to_string(),
            "subtitles='C\\:/clips/it\\'s.ass':fontsdir='fonts'"
        );
    }

    #[test]
    fn test_quoted_value() {
        let filter = Filter::new("blend").quoted("c1_expr", "A");
        assert_eq!(filter.to_string(), "blend=c1_expr='A'");
    }

    #[test]
    fn test_num_trims_zeros() {
        assert_eq!(num(2.0), "2");
        assert_eq!(num(2.05), "2.05");
        assert_eq!(num(1.0 + 62.0 * 0.0005), "1.031");
        assert_eq!(num(f64::NAN), "0");
        assert_eq!(num(-0.0000001), "0");
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn escaped_paths_have_no_bare_separators(path in "[a-zA-Z0-9:'/ ._-]{0,60}") {
                let escaped = escape_filter_path(Path::new(&path));
                let chars: Vec<char> = escaped.chars().collect();
                for (i, c) in chars.iter().enumerate() {
                    if *c == ':' || *c == '\'' {
                        prop_assert!(i > 0 && chars[i - 1] == '\\');
                    }
                }
            }

            #[test]
            fn num_round_trips_within_six_decimals(value in -1.0e6f64..1.0e6) {
                let text = num(value);
                prop_assert!(!text.contains('e'));
                let parsed: f64 = text.parse().unwrap();
                prop_assert!((parsed - value).abs() <= 6e-7);
            }
        }
    }
}
