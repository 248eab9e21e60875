#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::sync::{mpsc, Arc, Mutex};

mod api;
mod config;
mod history;
mod logger;
mod prompt;
mod stream;
mod translator;
mod ui;

fn main() {
    logger::init();
    logger::log("app starting");

    // Config from config.json next to the exe; env vars override if present.
    let mut cfg = config::Config::load();
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        if !v.is_empty() {
            cfg.api_key = v;
        }
    }
    if let Ok(v) = std::env::var("OPENAI_MODEL") {
        if !v.is_empty() {
            cfg.model = v;
        }
    }
    let cfg = Arc::new(Mutex::new(cfg));
    let history = Arc::new(Mutex::new(history::History::load()));

    let (job_tx, job_rx) = mpsc::channel::<translator::Job>();
    let (event_tx, event_rx) = mpsc::channel::<translator::UiEvent>();

    translator::spawn_worker(Arc::clone(&cfg), Arc::clone(&history), job_rx, event_tx);
    logger::log("worker spawned");

    // Run UI on the main thread (blocks until the window closes).
    ui::run(cfg, history, job_tx, event_rx);
    logger::log("app exiting");
}
