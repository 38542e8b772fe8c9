//! # Reading Graphs From Files
//!
//! Two plain text formats are supported. Lines starting with `#` or `%` are
//! comments in both.
//!
//! - Edge lists: one edge `source sink [weight]` per line. A line with a
//!     single token declares a vertex without edges.
//! - Adjacency lists: one line `source: sink sink ...` per vertex.
//!
//! Vertices are arbitrary tokens, numbered in order of first appearance.
//! Repeated edges add up their weights.

use std::{
    ffi::OsString,
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;

use crate::graph::Graph;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum FileFormat {
    /// Infer the file format from the file extension. `.el`, `.edges`,
    /// `.graph` and `.txt` are interpreted as edge lists, `.adj` as an
    /// adjacency list.
    Infer,
    /// An edge list
    EdgeList,
    /// An adjacency list
    AdjacencyList,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Infer => write!(f, "infer"),
            FileFormat::EdgeList => write!(f, "edge-list"),
            FileFormat::AdjacencyList => write!(f, "adjacency-list"),
        }
    }
}

macro_rules! is_one_of {
    ($a:expr, $($b:expr),*) => {
        $( $a == $b || )* false
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Cannot infer file format from extension {0:?}")]
    UnknownFileExtension(OsString),
    #[error("To infer the file format, the file needs to have a file extension")]
    NoFileExtension,
    #[error("Invalid line {line}: `{content}`")]
    InvalidLine { line: usize, content: String },
    #[error("Invalid edge weight in line {line}: `{weight}`")]
    InvalidWeight { line: usize, weight: String },
}

/// Reads a graph from a file
pub fn parse<P: AsRef<Path>>(path: P, file_format: FileFormat) -> anyhow::Result<Graph> {
    let path = path.as_ref();
    let file_format = match file_format {
        FileFormat::Infer => {
            let Some(ext) = path.extension() else {
                anyhow::bail!(Error::NoFileExtension)
            };
            if is_one_of!(ext, "el", "edges", "graph", "txt") {
                FileFormat::EdgeList
            } else if is_one_of!(ext, "adj") {
                FileFormat::AdjacencyList
            } else {
                anyhow::bail!(Error::UnknownFileExtension(OsString::from(ext)))
            }
        }
        format => format,
    };
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    );
    match file_format {
        FileFormat::AdjacencyList => parse_adjacency_list(reader),
        _ => parse_edge_list(reader),
    }
}

/// Yields the numbered content lines of a reader, without comments and blank lines
fn content_lines<R: BufRead>(reader: R) -> impl Iterator<Item = anyhow::Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
                    None
                } else {
                    Some(Ok((idx + 1, trimmed.to_string())))
                }
            }
            Err(err) => Some(Err(anyhow::Error::from(err).context("failed to read line"))),
        })
}

/// Parses an edge list
pub fn parse_edge_list<R: BufRead>(reader: R) -> anyhow::Result<Graph> {
    let mut graph = Graph::new();
    for line in content_lines(reader) {
        let (line, content) = line?;
        let tokens: Vec<_> = content.split_whitespace().collect();
        match tokens[..] {
            [vertex] => {
                graph.add_vertex(vertex);
            }
            [source, sink] => {
                graph.add_labelled_edge(source, sink, 1);
            }
            [source, sink, token] => {
                let invalid = || Error::InvalidWeight {
                    line,
                    weight: token.to_string(),
                };
                let weight = match token.parse::<usize>() {
                    Ok(weight) if weight > 0 => weight,
                    _ => anyhow::bail!(invalid()),
                };
                // parallel edges add up
                if graph.try_add_labelled_edge(source, sink, weight).is_none() {
                    anyhow::bail!(invalid())
                }
            }
            _ => anyhow::bail!(Error::InvalidLine {
                line,
                content: content.clone()
            }),
        }
    }
    Ok(graph)
}

/// Parses an adjacency list
pub fn parse_adjacency_list<R: BufRead>(reader: R) -> anyhow::Result<Graph> {
    let mut graph = Graph::new();
    for line in content_lines(reader) {
        let (line, content) = line?;
        let Some((source, sinks)) = content.split_once(':') else {
            anyhow::bail!(Error::InvalidLine {
                line,
                content: content.clone()
            })
        };
        let source = source.trim();
        if source.is_empty() || source.contains(char::is_whitespace) {
            anyhow::bail!(Error::InvalidLine {
                line,
                content: content.clone()
            })
        }
        graph.add_vertex(source);
        for sink in sinks.split(|c: char| c.is_whitespace() || c == ',') {
            if !sink.is_empty() {
                graph.add_labelled_edge(source, sink, 1);
            }
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{parse, parse_adjacency_list, parse_edge_list, Error, FileFormat};
    use crate::graph::Digraph;

    #[test]
    fn edge_list() {
        let data = "# mfas: 1\n0 1\n1 2 3\n\n% other comment\n2 0\n1 2\n7\n";
        let graph = parse_edge_list(Cursor::new(data)).unwrap();
        assert_eq!(graph.n_vertices(), 4);
        assert_eq!(graph.n_edges(), 3);
        let edge = graph.edge("1", "2").unwrap();
        assert_eq!(graph.weight(edge), Some(4));
        assert!(graph.vertex("7").is_some());
    }

    #[test]
    fn labels_in_order_of_appearance() {
        let graph = parse_edge_list(Cursor::new("b a\na c\n")).unwrap();
        assert_eq!(graph.vertex("b").unwrap().idx(), 0);
        assert_eq!(graph.vertex("a").unwrap().idx(), 1);
        assert_eq!(graph.vertex("c").unwrap().idx(), 2);
    }

    #[test]
    fn edge_list_errors() {
        let err = parse_edge_list(Cursor::new("0 1\n0 1 2 3\n")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::InvalidLine {
                line: 2,
                content: "0 1 2 3".to_string()
            })
        );
        let err = parse_edge_list(Cursor::new("0 1 x\n")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::InvalidWeight {
                line: 1,
                weight: "x".to_string()
            })
        );
    }

    #[test]
    fn zero_weight_rejected() {
        let err = parse_edge_list(Cursor::new("0 1 0\n1 0 1\n")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::InvalidWeight {
                line: 1,
                weight: "0".to_string()
            })
        );
    }

    #[test]
    fn merged_weight_overflow_rejected() {
        let data = format!("0 1 {}\n1 0\n0 1 1\n", usize::MAX);
        let err = parse_edge_list(Cursor::new(data)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::InvalidWeight {
                line: 3,
                weight: "1".to_string()
            })
        );
    }

    #[test]
    fn adjacency_list() {
        let data = "A: B, C\nB: C\nC:\nD: A D\n";
        let graph = parse_adjacency_list(Cursor::new(data)).unwrap();
        assert_eq!(graph.n_vertices(), 4);
        assert_eq!(graph.n_edges(), 5);
        assert!(graph.edge("D", "D").is_some());
        assert!(graph.edge("C", "A").is_none());
        let err = parse_adjacency_list(Cursor::new("A B\n")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidLine { line: 1, .. })
        ));
    }

    #[test]
    fn infer_format() {
        let err = parse("graph.xyz", FileFormat::Infer).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownFileExtension(_))
        ));
        let err = parse("graph", FileFormat::Infer).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::NoFileExtension));
    }
}
