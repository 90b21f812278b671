//! ppr-engine command line
//!
//! Replays a saved partial response against a saved page and prints the
//! resulting document.

use ppr_engine::network::{HttpResponse, TransportSet};
use ppr_engine::{AjaxContext, AjaxEngine, EngineConfig, NAME, Page, VERSION};
use std::env;
use std::fs;
use std::process::ExitCode;

const USAGE: &str = "usage: ppr-engine apply <page.html> <response.xml> [--config <config.json>] [--source <id>]
       ppr-engine --version";

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--version") | Some("-V") => {
            println!("{} {}", NAME, VERSION);
            ExitCode::SUCCESS
        }
        Some("apply") => match run_apply(&args[1..]) {
            Ok(html) => {
                println!("{}", html);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("{}", USAGE);
            ExitCode::from(2)
        }
    }
}

/// Arguments of the `apply` command
#[derive(Debug, PartialEq)]
struct ApplyArgs {
    page: String,
    response: String,
    config: Option<String>,
    source: String,
}

fn parse_apply_args(args: &[String]) -> Result<ApplyArgs, String> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut source = String::from("ppr-engine");
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(iter.next().ok_or_else(|| USAGE.to_string())?.clone()),
            "--source" => source = iter.next().ok_or_else(|| USAGE.to_string())?.clone(),
            _ => positional.push(arg.clone()),
        }
    }
    let [page, response] = positional.as_slice() else {
        return Err(USAGE.to_string());
    };
    Ok(ApplyArgs {
        page: page.clone(),
        response: response.clone(),
        config,
        source,
    })
}

fn run_apply(args: &[String]) -> Result<String, Box<dyn std::error::Error>> {
    let ApplyArgs {
        page: page_path,
        response: response_path,
        config: config_path,
        source,
    } = parse_apply_args(args)?;

    let config = match config_path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(&path)?)?,
        None => EngineConfig::default(),
    };
    let page = Page::from_html(&fs::read_to_string(&page_path)?, None)?;
    let body = fs::read_to_string(&response_path)?;
    log::info!("applying {} to {}", response_path, page_path);

    let engine = AjaxEngine::with_transports(page, config, TransportSet::new());
    let mut context = AjaxContext::new(source.as_str());
    let form_id = engine.with_page(|page| {
        let dom = page.dom();
        dom.element_by_id(&source)
            .and_then(|node| dom.enclosing_form(node))
            .and_then(|form| dom.attribute(form, "id"))
    });
    if let Some(form_id) = form_id {
        context = context.with_form(form_id);
    }

    engine.apply_response(&HttpResponse::new(200, body), &mut context)?;
    Ok(engine.with_page(|page| page.html()))
}
