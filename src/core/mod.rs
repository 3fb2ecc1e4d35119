use chrono::Utc;
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bridge::{MockSession, ScilabOptions, ScilabSession, Session};
use crate::error::{ProbeError, ProbeResult};
use crate::report::{ConsoleReport, HostInfo, ProbeReport};
use crate::stats::{Operation, TrialMeasurement};

pub mod config;
pub mod sample_buffer;

pub use config::{AppSettings, BridgeEngine, ProbeSettings, ScheduleEntry, TeardownPolicy};
pub use sample_buffer::SampleBuffer;

// ============================================================================
// SPEED PROBE
// ============================================================================

/// Lifecycle of a [`SpeedProbe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Session open, nothing measured yet
    Ready,
    /// Inside `run()`, or a run failed and the session was left open
    Running,
    /// Session closed; the probe cannot run again
    Closed,
}

/// Times eval, push and pull round trips through one engine session.
pub struct SpeedProbe<S: Session> {
    session: S,
    buffer: SampleBuffer,
    settings: ProbeSettings,
    state: ProbeState,
}

impl SpeedProbe<ScilabSession> {
    /// Start a Scilab engine and wrap it in a ready probe.
    pub async fn initialize(options: &ScilabOptions, settings: ProbeSettings) -> ProbeResult<Self> {
        let session = ScilabSession::start(options).await?;
        Ok(Self::new(session, settings))
    }
}

impl<S: Session> SpeedProbe<S> {
    /// Wrap an already open session.
    pub fn new(session: S, settings: ProbeSettings) -> Self {
        Self {
            session,
            buffer: SampleBuffer::new(),
            settings,
            state: ProbeState::Ready,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Refill the sample buffer with `side`×`side` elements.
    pub fn load_buffer(&mut self, side: usize) {
        self.buffer.regenerate(side);
    }

    /// Time `repeats` evaluations of the configured no-result command.
    pub async fn measure_raw_call(&mut self, repeats: usize) -> ProbeResult<TrialMeasurement> {
        let mut samples = Vec::with_capacity(repeats);
        for _ in 0..repeats {
            let start = Instant::now();
            self.session.eval(&self.settings.raw_command).await?;
            samples.push(start.elapsed());
        }
        Ok(TrialMeasurement::new(Operation::Raw, None, samples))
    }

    /// Time `repeats` pushes of the current sample buffer.
    pub async fn measure_upload(&mut self, repeats: usize) -> ProbeResult<TrialMeasurement> {
        let mut samples = Vec::with_capacity(repeats);
        for _ in 0..repeats {
            let start = Instant::now();
            self.session
                .push(&self.settings.variable, self.buffer.values())
                .await
                .map_err(ProbeError::into_transfer)?;
            samples.push(start.elapsed());
        }
        Ok(TrialMeasurement::new(Operation::Put, Some(self.buffer.side()), samples))
    }

    /// Time `repeats` pulls of the scratch variable.
    pub async fn measure_download(&mut self, repeats: usize) -> ProbeResult<TrialMeasurement> {
        let mut samples = Vec::with_capacity(repeats);
        for _ in 0..repeats {
            let start = Instant::now();
            self.session
                .pull(&self.settings.variable)
                .await
                .map_err(ProbeError::into_transfer)?;
            samples.push(start.elapsed());
        }
        Ok(TrialMeasurement::new(Operation::Get, Some(self.buffer.side()), samples))
    }

    /// Run the whole speed check, writing the console report to `out`.
    ///
    /// The completion footer is only written after the session closed
    /// cleanly. When a trial fails the error is returned as is; whether the
    /// session gets closed on that path depends on the teardown policy.
    pub async fn run<W: Write>(&mut self, out: W) -> ProbeResult<ProbeReport> {
        if self.state == ProbeState::Closed {
            return Err(ProbeError::SessionClosed);
        }
        self.state = ProbeState::Running;
        let bridge = self.session.name().to_string();
        let mut console = ConsoleReport::new(out);

        match self.run_schedule(&mut console).await {
            Ok((raw_call, transfers)) => {
                self.teardown().await?;
                console.footer()?;
                info!(bridge = %bridge, "Speed check complete");
                Ok(ProbeReport {
                    bridge,
                    generated_at: Utc::now(),
                    host: HostInfo::collect(),
                    raw_call,
                    transfers,
                })
            }
            Err(e) => {
                match self.settings.teardown {
                    TeardownPolicy::Always => {
                        if let Err(close_err) = self.teardown().await {
                            warn!("Failed to close session after error: {}", close_err);
                        }
                    }
                    TeardownPolicy::SuccessOnly => {
                        warn!("Trial failed, leaving the {} session open", bridge);
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_schedule<W: Write>(
        &mut self,
        console: &mut ConsoleReport<W>,
    ) -> ProbeResult<(TrialMeasurement, Vec<TrialMeasurement>)> {
        console.banner(self.session.name())?;
        if !self.settings.settle_delay.is_zero() {
            sleep(self.settings.settle_delay).await;
        }

        let raw_call = self.measure_raw_call(self.settings.raw_call_repeats).await?;
        console.raw_speed(raw_call.average())?;

        let schedule = self.settings.schedule.clone();
        let mut transfers = Vec::with_capacity(schedule.len() * 2);
        for entry in schedule {
            self.load_buffer(entry.side);
            debug!(side = entry.side, elements = self.buffer.len(), repeats = entry.repeats, "Transfer trial");

            let put = self.measure_upload(entry.repeats).await?;
            console.put(entry.side, put.average())?;
            transfers.push(put);

            let get = self.measure_download(entry.repeats).await?;
            console.get(entry.side, get.average())?;
            transfers.push(get);
        }
        Ok((raw_call, transfers))
    }

    async fn teardown(&mut self) -> ProbeResult<()> {
        let result = self.session.close().await;
        self.state = ProbeState::Closed;
        result
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Options taken from the command line
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub config: PathBuf,
    pub engine: Option<BridgeEngine>,
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub summary: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            config: PathBuf::from("appsettings.json"),
            engine: None,
            json: None,
            csv: None,
            summary: false,
        }
    }
}

/// Load settings, run the probe against the selected engine and save the exports.
pub async fn run_speed_check(options: &CheckOptions) -> ProbeResult<ProbeReport> {
    let mut settings = AppSettings::load(&options.config)?;
    if let Some(engine) = options.engine {
        settings.bridge_engine = engine;
    }
    let probe_settings = settings.probe_settings();
    info!(engine = ?settings.bridge_engine, "Starting speed check");

    let report = match settings.bridge_engine {
        BridgeEngine::Scilab => {
            let mut probe = SpeedProbe::initialize(&settings.scilab_options(), probe_settings).await?;
            probe.run(io::stdout()).await?
        }
        BridgeEngine::Mock => {
            let mut probe = SpeedProbe::new(MockSession::new(), probe_settings);
            probe.run(io::stdout()).await?
        }
    };

    if let Some(path) = &options.json {
        report.save_json(path)?;
        info!("Saved JSON report to {}", path.display());
    }
    if let Some(path) = &options.csv {
        report.save_csv(path)?;
        info!("Saved CSV report to {}", path.display());
    }
    if options.summary {
        println!();
        println!("{}", "Summary".bold().cyan());
        println!("{}", report.summary_table());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::{lock_log, MockCall};
    use std::time::Duration;

    fn quick_settings() -> ProbeSettings {
        ProbeSettings {
            settle_delay: Duration::ZERO,
            ..ProbeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_measurements_are_non_negative() {
        let mut probe = SpeedProbe::new(MockSession::new(), quick_settings());
        probe.load_buffer(10);

        let raw = probe.measure_raw_call(3).await.unwrap();
        let put = probe.measure_upload(2).await.unwrap();
        let get = probe.measure_download(2).await.unwrap();

        assert_eq!(raw.repeats, 3);
        assert_eq!(put.side, Some(10));
        assert_eq!(get.elements, 100);
        for trial in [&raw, &put, &get] {
            assert!(trial.average() >= Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn test_upload_failure_is_transfer_error() {
        let session = MockSession::new();
        session.trigger_failure();
        let mut probe = SpeedProbe::new(session, quick_settings());
        probe.load_buffer(1);
        let err = probe.measure_upload(1).await.unwrap_err();
        assert!(matches!(err, ProbeError::Transfer(_)));
    }

    #[tokio::test]
    async fn test_download_before_upload_fails() {
        let mut probe = SpeedProbe::new(MockSession::new(), quick_settings());
        assert!(matches!(probe.measure_download(1).await, Err(ProbeError::Transfer(_))));
    }

    #[tokio::test]
    async fn test_run_moves_to_closed() {
        let mut probe = SpeedProbe::new(MockSession::new(), quick_settings());
        assert_eq!(probe.state(), ProbeState::Ready);
        let report = probe.run(Vec::new()).await.unwrap();
        assert_eq!(probe.state(), ProbeState::Closed);
        assert!(probe.session().is_closed());
        assert_eq!(report.bridge, "Mock");
        assert_eq!(report.transfers.len(), 8);
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let mut probe = SpeedProbe::new(MockSession::new(), quick_settings());
        probe.run(Vec::new()).await.unwrap();
        assert!(matches!(probe.run(Vec::new()).await, Err(ProbeError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_custom_raw_command_and_variable() {
        let settings = ProbeSettings {
            raw_command: "scratch = 2".to_string(),
            variable: "payload".to_string(),
            schedule: vec![ScheduleEntry::new(2, 1)],
            raw_call_repeats: 1,
            ..quick_settings()
        };
        let session = MockSession::new();
        let log = session.call_log();
        let mut probe = SpeedProbe::new(session, settings);
        probe.run(Vec::new()).await.unwrap();

        assert_eq!(
            lock_log(&log).clone(),
            vec![
                MockCall::Eval("scratch = 2".into()),
                MockCall::Push { name: "payload".into(), len: 4 },
                MockCall::Pull("payload".into()),
                MockCall::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_settle_delay_is_applied() {
        let settings = ProbeSettings {
            settle_delay: Duration::from_millis(30),
            schedule: vec![ScheduleEntry::new(1, 1)],
            raw_call_repeats: 1,
            ..quick_settings()
        };
        let mut probe = SpeedProbe::new(MockSession::new(), settings);
        let start = Instant::now();
        probe.run(Vec::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_run_speed_check_with_mock_engine() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("appsettings.json");
        std::fs::write(
            &config,
            r#"{ "SettleDelayMs": 0, "RawCallRepeats": 2, "Schedule": [{ "Side": 4, "Repeats": 2 }] }"#,
        )
        .unwrap();
        let options = CheckOptions {
            config,
            engine: Some(BridgeEngine::Mock),
            json: Some(dir.path().join("report.json")),
            csv: Some(dir.path().join("report.csv")),
            summary: false,
        };

        let report = run_speed_check(&options).await.unwrap();
        assert_eq!(report.raw_call.repeats, 2);
        assert_eq!(report.transfers.len(), 2);
        assert!(dir.path().join("report.json").exists());
        let csv_text = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert_eq!(csv_text.lines().count(), 4);
    }
}
