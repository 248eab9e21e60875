use eframe::egui;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{Config, Theme, DEFAULT_API_URL, DEFAULT_MODEL};
use crate::history::History;
use crate::logger;
use crate::prompt;
use crate::translator::{CancelToken, Job, Outcome, UiEvent};

const SOURCE_LANGS: &[&str] = &[
    "Auto", "zh-CN", "zh-TW", "en", "ja", "ko", "fr", "de", "es", "ru",
];
const TARGET_LANGS: &[&str] = &["zh-CN", "zh-TW", "en", "ja", "ko", "fr", "de", "es", "ru"];
const MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1"];

const TOAST_DURATION: Duration = Duration::from_secs(2);

pub fn run(
    cfg: Arc<Mutex<Config>>,
    history: Arc<Mutex<History>>,
    jobs: Sender<Job>,
    events: Receiver<UiEvent>,
) {
    let app = App::new(cfg, history, jobs, events);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("LLM Translator")
            .with_inner_size([900.0, 620.0]),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "LLM Translator",
        native_options,
        Box::new(move |_cc| Box::new(app)),
    ) {
        logger::log(&format!("UI error: {}", e));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    Translate,
    History,
    Settings,
}

#[derive(Clone, Copy)]
enum ToastKind {
    Success,
    Error,
}

struct Toast {
    message: String,
    kind: ToastKind,
    shown_at: Instant,
}

/// Draft of the settings tab; committed to `Config` when the tab is left,
/// like the original's save-on-close panel.
#[derive(Default)]
struct SettingsDraft {
    api_url: String,
    api_key: String,
    model_choice: String,
    custom_model: String,
    temperature: f32,
    stream: bool,
}

impl SettingsDraft {
    fn from_config(cfg: &Config) -> Self {
        let predefined = MODELS.contains(&cfg.model.as_str());
        Self {
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            model_choice: if predefined { cfg.model.clone() } else { "custom".into() },
            custom_model: if predefined { String::new() } else { cfg.model.clone() },
            temperature: cfg.temperature,
            stream: cfg.stream,
        }
    }
}

struct App {
    cfg: Arc<Mutex<Config>>,
    history: Arc<Mutex<History>>,
    jobs: Sender<Job>,
    events: Receiver<UiEvent>,

    tab: Tab,
    input: String,
    output: String,
    error: Option<String>,
    source: String,
    target: String,

    /// The one in-flight attempt, if any. All incoming events are identity
    /// checked against this slot so a superseded attempt cannot clobber a
    /// newer one's state.
    active: Option<CancelToken>,
    loading: bool,

    toast: Option<Toast>,
    draft: SettingsDraft,
    settings_dirty: bool,
    confirm_clear: bool,
    applied_theme: Option<Theme>,
}

impl App {
    fn new(
        cfg: Arc<Mutex<Config>>,
        history: Arc<Mutex<History>>,
        jobs: Sender<Job>,
        events: Receiver<UiEvent>,
    ) -> Self {
        let (source, target) = {
            let c = cfg.lock().unwrap();
            (c.source_lang.clone(), c.target_lang.clone())
        };
        Self {
            cfg,
            history,
            jobs,
            events,
            tab: Tab::Translate,
            input: String::new(),
            output: String::new(),
            error: None,
            source,
            target,
            active: None,
            loading: false,
            toast: None,
            draft: SettingsDraft::default(),
            settings_dirty: false,
            confirm_clear: false,
            applied_theme: None,
        }
    }

    fn toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast {
            message: message.into(),
            kind,
            shown_at: Instant::now(),
        });
    }

    fn is_active(&self, token: &CancelToken) -> bool {
        self.active
            .as_ref()
            .map(|t| t.same_attempt(token))
            .unwrap_or(false)
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                UiEvent::Started(token) if self.is_active(&token) => {
                    self.loading = false;
                }
                UiEvent::Delta(token, text) if self.is_active(&token) => {
                    self.output.push_str(&text);
                }
                UiEvent::Finished(token, outcome) if self.is_active(&token) => {
                    self.active = None;
                    self.loading = false;
                    match outcome {
                        Outcome::Done(text) => {
                            self.output = text;
                            self.toast("Translation Done", ToastKind::Success);
                        }
                        Outcome::Cancelled => {
                            self.toast("Translation Aborted", ToastKind::Error);
                        }
                        Outcome::Failed(message) => {
                            self.error = Some(message);
                        }
                    }
                }
                // Events from attempts that were cancelled and replaced.
                _ => {}
            }
        }
    }

    fn start_translation(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }
        let api_key_missing = self.cfg.lock().unwrap().api_key.is_empty();
        if api_key_missing {
            self.toast("Please configure API Key in settings first", ToastKind::Error);
            self.open_settings();
            return;
        }
        // Single-flight: a superseded attempt is cancelled before the new
        // one is queued; the worker runs jobs serially so the old attempt has
        // unwound before the new network call goes out.
        if let Some(token) = &self.active {
            token.cancel();
        }
        let token = CancelToken::new();
        self.active = Some(token.clone());
        self.output.clear();
        self.error = None;
        self.loading = true;
        let _ = self.jobs.send(Job {
            input: self.input.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            token,
        });
    }

    fn stop_translation(&mut self) {
        if let Some(token) = &self.active {
            token.cancel();
        }
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.output.clear();
        self.error = None;
        self.loading = false;
        self.stop_translation();
    }

    fn open_settings(&mut self) {
        if self.tab != Tab::Settings {
            self.draft = SettingsDraft::from_config(&self.cfg.lock().unwrap());
            self.settings_dirty = false;
            self.tab = Tab::Settings;
        }
    }

    fn persist_langs(&mut self) {
        let mut cfg = self.cfg.lock().unwrap();
        cfg.source_lang = self.source.clone();
        cfg.target_lang = self.target.clone();
        if let Err(e) = cfg.save() {
            logger::log(&format!("failed to save language prefs: {e}"));
        }
    }

    fn swap_languages(&mut self) {
        // "Auto" only exists on the source side; swapping it would make an
        // unusable target.
        if self.source == "Auto" {
            return;
        }
        std::mem::swap(&mut self.source, &mut self.target);
        self.persist_langs();
    }

    fn save_settings_if_dirty(&mut self) {
        if !self.settings_dirty {
            return;
        }
        {
            let mut cfg = self.cfg.lock().unwrap();
            cfg.set_api_url(&self.draft.api_url);
            cfg.api_key = self.draft.api_key.trim().to_string();
            cfg.model = if self.draft.model_choice == "custom" {
                let custom = self.draft.custom_model.trim();
                if custom.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    custom.to_string()
                }
            } else {
                self.draft.model_choice.clone()
            };
            cfg.temperature = self.draft.temperature;
            cfg.stream = self.draft.stream;
            if let Err(e) = cfg.save() {
                logger::log(&format!("failed to save settings: {e}"));
            }
        }
        self.settings_dirty = false;
        self.toast("Settings Saved", ToastKind::Success);
    }

    fn cycle_theme(&mut self) {
        let mut cfg = self.cfg.lock().unwrap();
        cfg.theme = cfg.theme.cycle();
        if let Err(e) = cfg.save() {
            logger::log(&format!("failed to save theme: {e}"));
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        let theme = self.cfg.lock().unwrap().theme;
        if self.applied_theme == Some(theme) {
            return;
        }
        let visuals = match theme {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
            Theme::Auto => egui::Visuals::default(),
        };
        ctx.set_visuals(visuals);
        self.applied_theme = Some(theme);
    }

    fn display_lang(code: &str) -> String {
        if code == "Auto" {
            "Auto".to_string()
        } else {
            prompt::lang_name(code).to_string()
        }
    }

    fn show_translate_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut lang_changed = false;
            egui::ComboBox::from_id_source("source-lang")
                .selected_text(Self::display_lang(&self.source))
                .show_ui(ui, |ui| {
                    for code in SOURCE_LANGS {
                        lang_changed |= ui
                            .selectable_value(&mut self.source, code.to_string(), Self::display_lang(code))
                            .clicked();
                    }
                });
            if ui.button("⇄").on_hover_text("Swap languages").clicked() {
                self.swap_languages();
            }
            egui::ComboBox::from_id_source("target-lang")
                .selected_text(Self::display_lang(&self.target))
                .show_ui(ui, |ui| {
                    for code in TARGET_LANGS {
                        lang_changed |= ui
                            .selectable_value(&mut self.target, code.to_string(), Self::display_lang(code))
                            .clicked();
                    }
                });
            if lang_changed {
                self.persist_langs();
            }
        });

        ui.add_space(6.0);
        ui.add(
            egui::TextEdit::multiline(&mut self.input)
                .desired_rows(6)
                .desired_width(f32::INFINITY)
                .hint_text("Enter text to translate..."),
        );

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            if self.active.is_some() {
                if ui.button("Stop").clicked() {
                    self.stop_translation();
                }
            } else if ui.button("Translate").clicked() {
                self.start_translation();
            }
            if ui.button("Clear").clicked() {
                self.clear_input();
            }
            if !self.output.is_empty() && self.error.is_none() && ui.button("Copy").clicked() {
                ui.output_mut(|o| o.copied_text = self.output.clone());
            }
            if self.loading {
                ui.spinner();
                ui.weak("Please wait...");
            }
        });

        ui.separator();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if let Some(error) = &self.error {
                    ui.colored_label(
                        egui::Color32::from_rgb(220, 60, 60),
                        format!("Error: {error}"),
                    );
                } else if self.output.is_empty() && !self.loading {
                    ui.weak("Translation will appear here...");
                } else {
                    let mut shown = self.output.as_str();
                    ui.add(
                        egui::TextEdit::multiline(&mut shown)
                            .desired_rows(8)
                            .desired_width(f32::INFINITY),
                    );
                }
            });
    }

    fn show_history_tab(&mut self, ui: &mut egui::Ui) {
        if self.history.lock().unwrap().is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.weak("No history yet");
            });
            self.confirm_clear = false;
            return;
        }
        let entries = self.history.lock().unwrap().entries().to_vec();

        ui.horizontal(|ui| {
            if self.confirm_clear {
                if ui.button("Confirm clear all").clicked() {
                    if let Err(e) = self.history.lock().unwrap().clear() {
                        logger::log(&format!("failed to clear history: {e}"));
                    }
                    self.confirm_clear = false;
                }
                if ui.button("Cancel").clicked() {
                    self.confirm_clear = false;
                }
            } else if ui.button("Clear All").clicked() {
                self.confirm_clear = true;
            }
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for entry in &entries {
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            ui.strong(format!(
                                "{} → {}",
                                Self::display_lang(&entry.from),
                                Self::display_lang(&entry.to)
                            ));
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| ui.weak(&entry.timestamp),
                            );
                        });
                        ui.label(&entry.original);
                        ui.separator();
                        ui.label(&entry.translated);
                    });
                    ui.add_space(4.0);
                }
            });
    }

    fn show_settings_tab(&mut self, ui: &mut egui::Ui) {
        ui.label("API Base URL");
        ui.horizontal(|ui| {
            if ui.text_edit_singleline(&mut self.draft.api_url).changed() {
                self.settings_dirty = true;
            }
            if ui.button("Reset Default").clicked() {
                self.draft.api_url = DEFAULT_API_URL.to_string();
                self.settings_dirty = true;
            }
        });

        ui.add_space(6.0);
        ui.label("API Key");
        if ui
            .add(egui::TextEdit::singleline(&mut self.draft.api_key).password(true).hint_text("sk-..."))
            .changed()
        {
            self.settings_dirty = true;
        }

        ui.add_space(6.0);
        ui.label("Model");
        let selected = if self.draft.model_choice == "custom" {
            "Custom".to_string()
        } else {
            self.draft.model_choice.clone()
        };
        egui::ComboBox::from_id_source("model-select")
            .selected_text(selected)
            .show_ui(ui, |ui| {
                for model in MODELS {
                    if ui
                        .selectable_value(&mut self.draft.model_choice, model.to_string(), *model)
                        .clicked()
                    {
                        self.settings_dirty = true;
                    }
                }
                if ui
                    .selectable_value(&mut self.draft.model_choice, "custom".to_string(), "Custom")
                    .clicked()
                {
                    self.settings_dirty = true;
                }
            });
        if self.draft.model_choice == "custom"
            && ui
                .add(egui::TextEdit::singleline(&mut self.draft.custom_model).hint_text("Enter Model ID"))
                .changed()
        {
            self.settings_dirty = true;
        }

        ui.add_space(6.0);
        ui.label("Temperature");
        if ui
            .add(egui::Slider::new(&mut self.draft.temperature, 0.0..=2.0))
            .changed()
        {
            self.settings_dirty = true;
        }

        ui.add_space(6.0);
        if ui.checkbox(&mut self.draft.stream, "Streaming Output").changed() {
            self.settings_dirty = true;
        }

        ui.add_space(12.0);
        ui.weak("Settings are saved when you leave this tab.");
    }

    fn show_toast(&mut self, ctx: &egui::Context) {
        let Some(toast) = &self.toast else { return };
        if toast.shown_at.elapsed() > TOAST_DURATION {
            self.toast = None;
            return;
        }
        let (bg, fg) = match toast.kind {
            ToastKind::Success => (
                egui::Color32::from_rgb(25, 80, 40),
                egui::Color32::from_rgb(160, 235, 180),
            ),
            ToastKind::Error => (
                egui::Color32::from_rgb(90, 30, 30),
                egui::Color32::from_rgb(245, 170, 170),
            ),
        };
        egui::Area::new(egui::Id::new("toast"))
            .anchor(egui::Align2::CENTER_TOP, [0.0, 24.0])
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).fill(bg).show(ui, |ui| {
                    ui.colored_label(fg, &toast.message);
                });
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn test_app() -> (App, mpsc::Receiver<Job>, mpsc::Sender<UiEvent>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.api_key = "sk-test".into();
        let cfg = Arc::new(Mutex::new(cfg));
        let history = Arc::new(Mutex::new(History::load_from(dir.path().join("history.json"))));
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        (App::new(cfg, history, job_tx, event_rx), job_rx, event_tx, dir)
    }

    #[test]
    fn whitespace_only_input_is_a_no_op() {
        let (mut app, jobs, _events, _dir) = test_app();
        app.input = "  \n\t ".into();
        app.start_translation();
        assert!(app.active.is_none());
        assert!(!app.loading);
        assert!(jobs.try_recv().is_err());
    }

    #[test]
    fn starting_again_cancels_the_prior_attempt() {
        let (mut app, jobs, _events, _dir) = test_app();
        app.input = "hello".into();
        app.start_translation();
        let first = jobs.try_recv().unwrap().token;
        assert!(!first.is_cancelled());

        app.start_translation();
        let second = jobs.try_recv().unwrap().token;
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!first.same_attempt(&second));
        // Only the newest attempt's events are accepted from here on.
        assert!(app.is_active(&second));
        assert!(!app.is_active(&first));
    }

    #[test]
    fn missing_api_key_opens_settings_without_queueing() {
        let (mut app, jobs, _events, _dir) = test_app();
        app.cfg.lock().unwrap().api_key.clear();
        app.input = "hello".into();
        app.start_translation();
        assert!(app.active.is_none());
        assert!(jobs.try_recv().is_err());
        assert!(matches!(app.tab, Tab::Settings));
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Wake periodically so worker events are picked up without user input.
        ctx.request_repaint_after(Duration::from_millis(120));
        self.apply_theme(ctx);
        self.drain_events();

        let previous_tab = self.tab;
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("LLM Translator");
                ui.separator();
                ui.selectable_value(&mut self.tab, Tab::Translate, "Translate");
                ui.selectable_value(&mut self.tab, Tab::History, "History");
                ui.selectable_value(&mut self.tab, Tab::Settings, "Settings");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let theme = self.cfg.lock().unwrap().theme;
                    let label = match theme {
                        Theme::Auto => "Theme: Auto",
                        Theme::Light => "Theme: Light",
                        Theme::Dark => "Theme: Dark",
                    };
                    if ui.button(label).clicked() {
                        self.cycle_theme();
                    }
                });
            });
        });

        if previous_tab != self.tab {
            if previous_tab == Tab::Settings {
                self.save_settings_if_dirty();
            }
            if self.tab == Tab::Settings {
                self.draft = SettingsDraft::from_config(&self.cfg.lock().unwrap());
                self.settings_dirty = false;
            }
            if previous_tab == Tab::History {
                self.confirm_clear = false;
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Translate => self.show_translate_tab(ui),
            Tab::History => self.show_history_tab(ui),
            Tab::Settings => self.show_settings_tab(ui),
        });

        self.show_toast(ctx);
    }
}
