//! End-to-end tests of the rewriting passes on realistic sources.

mod canonicalize;
mod instrument;
mod make_static;
mod pipeline;

use dce_probe::config::Passes;
use dce_probe::driver::{transform_source, FileReport, Pipeline};
use dce_probe::ts::SourceLang;
use std::path::Path;

pub fn pipeline(passes: Passes, prefix: &str) -> Pipeline {
    Pipeline {
        passes,
        prefix: prefix.to_string(),
        ..Pipeline::default()
    }
}

pub fn transform(source: &str, lang: SourceLang, pipeline: &Pipeline) -> FileReport {
    transform_source(Path::new("unit.c"), source, lang, pipeline).unwrap()
}

pub fn canonical(source: &str) -> String {
    transform(source, SourceLang::C, &pipeline(Passes::only_canonicalize(), "Marker")).rewritten
}

pub fn instrumented(source: &str, prefix: &str) -> FileReport {
    transform(source, SourceLang::C, &pipeline(Passes::default(), prefix))
}
