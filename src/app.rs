//! Main application logic and orchestration

use crate::audio::{self, AudioConfig, Capture};
use crate::config::{CaptureMode, Config};
use crate::error::{AppError, AppResult};
use crate::pcm::SampleFormat;
use crate::state::{AppState, MeterSnapshot, SharedMeter};
use crate::ui;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

/// Main application struct
pub struct App {
    config: Config,
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
}

/// Exit codes for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    UserExit = 1,  // User pressed Escape or Ctrl+C
    Error = 2,     // Actual application error
}

/// Result type that includes user exit information
pub type AppRunResult = Result<(), AppError>;

/// Extended result that tracks exit reason
pub struct RunResult {
    pub result: AppRunResult,
    pub exit_code: ExitCode,
}

/// What a key press asks the meter to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Reset,
    ToggleSuspend,
    ToggleMode,
    NextDevice,
    None,
}

/// Map a key press to an action
pub fn key_action(key_event: &KeyEvent) -> KeyAction {
    match key_event.code {
        KeyCode::Esc | KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('r') => KeyAction::Reset,
        KeyCode::Char(' ') => KeyAction::ToggleSuspend,
        KeyCode::Char('m') => KeyAction::ToggleMode,
        KeyCode::Char('d') => KeyAction::NextDevice,
        _ => KeyAction::None,
    }
}

/// Short description of the negotiated sample format for the device block
pub fn describe_format(format: &SampleFormat) -> String {
    let decodable = if format.is_decodable() { "" } else { ", unsupported" };
    format!(
        "{}-bit {:?} {:?}-endian, {} ch{}",
        format.bits, format.sample_type, format.byte_order, format.channels, decodable
    )
}

/// Ask for a device up front when `--select` was given
pub fn resolve_device(config: &mut Config) -> AppResult<()> {
    if config.select_device {
        config.device_name = Some(
            audio::select_input_device()?
                .ok_or_else(|| AppError::AudioDevice("No audio input devices found".to_string()))?,
        );
    }
    Ok(())
}

/// An open input device with its meter
struct Monitor {
    audio_config: AudioConfig,
    meter: SharedMeter,
    capture: Capture,
    format_label: String,
}

impl Monitor {
    /// Open `device_name` (or the default device). With a `previous` meter the
    /// new one keeps its history length but starts from silence.
    fn open(
        config: &Config,
        device_name: Option<String>,
        mode: CaptureMode,
        previous: Option<&SharedMeter>,
    ) -> AppResult<Self> {
        let (device, audio_config) = audio::setup_audio_device(device_name, config.sample_rate)?;
        let format = audio_config.pcm_format();
        let meter = match previous {
            Some(previous) => previous.reconfigured(format)?,
            None => SharedMeter::new(format, config.history)?,
        };
        let capture = Capture::start(&device, &audio_config, meter.clone(), mode, config.chunk_bytes)?;

        Ok(Self {
            audio_config,
            meter,
            capture,
            format_label: describe_format(&format),
        })
    }

    fn device_name(&self) -> &str {
        &self.audio_config.device_name
    }

    /// Close this device and open `next`. If `next` fails to open, the
    /// previous device is reopened instead.
    fn switch_to(self, config: &Config, next: String) -> AppResult<Self> {
        let previous_name = self.audio_config.device_name.clone();
        let mode = self.capture.mode();
        let meter = self.meter.clone();

        // The old stream must be gone before the next device is opened
        drop(self);

        match Self::open(config, Some(next.clone()), mode, Some(&meter)) {
            Ok(monitor) => {
                tracing::info!(from = %previous_name, to = %next, "input device switched");
                Ok(monitor)
            }
            Err(e) => {
                tracing::warn!("could not open {}: {}", next, e);
                Self::open(config, Some(previous_name), mode, Some(&meter))
            }
        }
    }
}

impl App {
    /// Initialize the application with configuration
    pub fn new_with_config(config: Config) -> AppResult<Self> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(App { config, terminal })
    }

    /// Run the main application loop
    pub async fn run(mut self) -> RunResult {
        let outcome = self.run_loop().await;

        // Cleanup - ensure graceful exit
        let _ = self.cleanup(); // Ignore cleanup errors

        match outcome {
            Ok(exit_code) => RunResult {
                result: Ok(()),
                exit_code,
            },
            Err(e) => RunResult {
                result: Err(e),
                exit_code: ExitCode::Error,
            },
        }
    }

    async fn run_loop(&mut self) -> AppResult<ExitCode> {
        let mut monitor = Monitor::open(&self.config, self.config.device_name.clone(), self.config.mode, None)?;
        let mut app_state = AppState::new(monitor.device_name().to_string(), monitor.capture.mode());

        let mut interval = tokio::time::interval(Duration::from_millis(crate::constants::ui::UPDATE_INTERVAL_MS));

        loop {
            // Pull mode measures queued bytes here; push mode already has
            monitor.capture.drain(|_| {});
            app_state.update_from_meter(&monitor.meter);

            self.terminal.draw(|f| {
                let ui_state = ui::UiState {
                    device_name: app_state.device_name.clone(),
                    format: monitor.format_label.clone(),
                    status: app_state.status(),
                    current: app_state.meter.scaled_mean,
                    max: app_state.meter.running_max,
                    raw: app_state.meter.level * 100.0,
                };
                ui::render_ui(f, &ui_state);
            })?;

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(ExitCode::UserExit);
                }
                _ = tokio::time::sleep(Duration::from_millis(1)) => {}
            }

            loop {
                match crossterm::event::poll(Duration::from_millis(0)) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::debug!("terminal event poll failed: {}", e);
                        break;
                    }
                }

                let key_event = match crossterm::event::read() {
                    Ok(Event::Key(key_event)) => key_event,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!("terminal event read failed: {}", e);
                        continue;
                    }
                };

                match key_action(&key_event) {
                    KeyAction::Quit => return Ok(ExitCode::UserExit),
                    KeyAction::Reset => monitor.meter.reset(),
                    KeyAction::ToggleSuspend => {
                        let toggled = if app_state.suspended {
                            monitor.capture.resume()
                        } else {
                            monitor.capture.suspend()
                        };
                        match toggled {
                            Ok(()) => app_state.suspended = !app_state.suspended,
                            Err(e) => tracing::warn!("{}", e),
                        }
                    }
                    KeyAction::ToggleMode => {
                        let mode = monitor.capture.mode().toggled();
                        monitor.capture.set_mode(mode);
                        app_state.mode = mode;
                    }
                    KeyAction::NextDevice => {
                        let next = match audio::list_input_devices() {
                            Ok(devices) => audio::next_device_name(&devices, monitor.device_name()),
                            Err(e) => {
                                tracing::warn!("{}", e);
                                None
                            }
                        };
                        match next {
                            Some(name) => {
                                monitor = monitor.switch_to(&self.config, name)?;
                                app_state.switch_device(monitor.device_name().to_string());
                            }
                            None => tracing::debug!("no other input device to switch to"),
                        }
                    }
                    KeyAction::None => {}
                }
            }

            interval.tick().await;
        }
    }

    /// Clean up terminal state
    fn cleanup(mut self) -> AppResult<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// One stdout line per measured chunk: peak percent and smoothed percent
pub fn format_print_line(snapshot: &MeterSnapshot, quiet: bool) -> String {
    let current = ui::display_percent(snapshot.scaled_mean);
    if quiet {
        current.to_string()
    } else {
        format!("{:.2} {}", snapshot.level * 100.0, current)
    }
}

/// Measure without a UI, printing every chunk, until `seconds` elapse or
/// Ctrl+C. Returns the running maximum.
pub async fn run_print(config: &Config, seconds: Option<f32>, quiet: bool) -> AppResult<f32> {
    let (device, audio_config) = audio::setup_audio_device(config.device_name.clone(), config.sample_rate)?;
    let meter = SharedMeter::new(audio_config.pcm_format(), config.history)?;
    let mut capture = Capture::start(
        &device,
        &audio_config,
        meter.clone(),
        CaptureMode::Pull,
        config.chunk_bytes,
    )?;

    let deadline = seconds
        .map(crate::config::parse_seconds)
        .transpose()?
        .map(|duration| tokio::time::Instant::now() + duration);
    let mut interval = tokio::time::interval(Duration::from_millis(crate::constants::ui::UPDATE_INTERVAL_MS));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = interval.tick() => {}
        }

        capture.drain(|snapshot| println!("{}", format_print_line(snapshot, quiet)));

        if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
            break;
        }
    }

    capture.drain(|snapshot| println!("{}", format_print_line(snapshot, quiet)));
    Ok(meter.snapshot().running_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::{ByteOrder, SampleType};

    #[test]
    fn test_key_actions() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert_eq!(key_action(&key(KeyCode::Esc)), KeyAction::Quit);
        assert_eq!(key_action(&key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(key_action(&key(KeyCode::Char('r'))), KeyAction::Reset);
        assert_eq!(key_action(&key(KeyCode::Char(' '))), KeyAction::ToggleSuspend);
        assert_eq!(key_action(&key(KeyCode::Char('m'))), KeyAction::ToggleMode);
        assert_eq!(key_action(&key(KeyCode::Char('d'))), KeyAction::NextDevice);
        assert_eq!(key_action(&key(KeyCode::Char('c'))), KeyAction::None);
        assert_eq!(
            key_action(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
    }

    #[test]
    fn test_print_line() {
        let snapshot = MeterSnapshot {
            level: 0.5,
            scaled_mean: 37.8,
            running_max: 40.0,
            buffers: 3,
            dropped: 0,
        };
        assert_eq!(format_print_line(&snapshot, false), "50.00 37");
        assert_eq!(format_print_line(&snapshot, true), "37");
    }

    #[test]
    fn test_describe_format() {
        let format = SampleFormat::new(16, SampleType::Signed, ByteOrder::Little, 1);
        assert_eq!(describe_format(&format), "16-bit Signed Little-endian, 1 ch");

        let format = SampleFormat::new(32, SampleType::Float, ByteOrder::Little, 2);
        assert!(describe_format(&format).ends_with("unsupported"));
    }
}
