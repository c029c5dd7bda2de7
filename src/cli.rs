use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use serde::Serialize;

use crate::config::Config;
use crate::data::category::{classify, Category};
use crate::data::overpass::OverpassSource;
use crate::server;
use crate::session::SessionContext;

const USAGE: &str = "usage: makerspaces <serve|render|classify|summary>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Render,
    Classify,
    Summary,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("render") => Some(Command::Render),
        Some("classify") => Some(Command::Classify),
        Some("summary") => Some(Command::Summary),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Render) => handle_render(args),
        Some(Command::Classify) => handle_classify(args),
        Some(Command::Summary) => handle_summary(),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn open_session(config: &Config) -> Option<SessionContext> {
    let source = OverpassSource::new(config.overpass_url.clone(), config.region.clone());
    match SessionContext::open(config, &source) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::error!(%err, "failed to load data");
            eprintln!("failed to load data: {err}");
            None
        }
    }
}

fn handle_serve() -> i32 {
    let config = Config::from_env();
    config.log_summary();
    let Some(session) = open_session(&config) else {
        return 1;
    };
    match server::run_server(&config.bind_addr, session) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(%err, "server error");
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_render(args: &[String]) -> i32 {
    let Some(out_path) = args.get(2) else {
        eprintln!("usage: makerspaces render <out.html> [category...]");
        return 2;
    };
    let mut chosen = BTreeSet::new();
    for label in &args[3..] {
        match label.parse::<Category>() {
            Ok(category) => {
                chosen.insert(category);
            }
            Err(err) => {
                eprintln!("{err}");
                return 2;
            }
        }
    }

    let config = Config::from_env();
    let Some(mut session) = open_session(&config) else {
        return 1;
    };
    session.select_categories(chosen);
    let artifact = session.map();
    if let Err(err) = fs::write(out_path, &artifact.html) {
        eprintln!("failed to write map '{out_path}': {err}");
        return 1;
    }
    println!(
        "map written: path='{}', markers={}",
        out_path,
        artifact.markers.len()
    );
    0
}

fn handle_classify(args: &[String]) -> i32 {
    let name = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
    if name.trim().is_empty() {
        eprintln!("usage: makerspaces classify <school name>");
        return 2;
    }
    println!("{}", classify(&name));
    0
}

/// Counts per category are per map location.
#[derive(Debug, Serialize)]
struct CategorySummary {
    schools: usize,
    makerspaces: usize,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    schools: usize,
    makerspaces: usize,
    categories: BTreeMap<&'static str, CategorySummary>,
    recorded: Vec<&'a str>,
}

fn handle_summary() -> i32 {
    let config = Config::from_env();
    let Some(session) = open_session(&config) else {
        return 1;
    };
    let store = session.store();

    let mut categories: BTreeMap<&'static str, CategorySummary> = BTreeMap::new();
    let mut recorded = Vec::new();
    for location in session.catalog() {
        let has_space = store.get(&location.name).map_or(false, |r| r.has_space());
        let entry = categories
            .entry(location.category.label())
            .or_insert(CategorySummary {
                schools: 0,
                makerspaces: 0,
            });
        entry.schools += 1;
        if has_space {
            entry.makerspaces += 1;
            recorded.push(location.name.as_str());
        }
    }
    // records are keyed by name, so same-named locations share one makerspace
    recorded.sort_unstable();
    recorded.dedup();

    let summary = Summary {
        schools: session.catalog().len(),
        makerspaces: recorded.len(),
        categories,
        recorded,
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize summary: {err}");
            1
        }
    }
}
