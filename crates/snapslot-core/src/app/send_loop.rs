//! AutoSendLoop - 環境からの合図をパスに変えるバックグラウンドタスク
//!
//! # トリガー
//! - 起動直後に 1 回（Boot）
//! - 一定間隔のタイマー（既定 8 秒）
//! - `Signal::ConnectivityRestored` / `Signal::Foreground`（環境アダプタが送る）
//!
//! パスが走っている間に届いた合図はチャネルに溜まり、次のループで処理されます。
//! 重なった場合は single-flight により捨てられます。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::session::UploadSession;
use crate::domain::{PassOutcome, Trigger};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(8);

const SIGNAL_BUFFER: usize = 16;

/// Environment signal delivered to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ConnectivityRestored,
    Foreground,
    SendNow,
}

impl Signal {
    fn trigger(self) -> Trigger {
        match self {
            Signal::ConnectivityRestored => Trigger::ConnectivityRestored,
            Signal::Foreground => Trigger::Foreground,
            Signal::SendNow => Trigger::Manual,
        }
    }
}

/// Send loop handle.
/// - `request_shutdown()` でループを止める（実行中のパスは最後まで走る）
/// - `shutdown_and_join()` で終了を待てる
pub struct AutoSendLoop {
    shutdown_tx: watch::Sender<bool>,
    signal_tx: mpsc::Sender<Signal>,
    join: JoinHandle<()>,
}

impl AutoSendLoop {
    pub fn spawn(session: Arc<UploadSession>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);

        let join = tokio::spawn(async move {
            send_loop(session, interval, signal_rx, shutdown_rx).await;
        });

        Self {
            shutdown_tx,
            signal_tx,
            join,
        }
    }

    /// Deliver a signal. Returns false if it was dropped (buffer full or loop gone).
    pub fn notify(&self, signal: Signal) -> bool {
        self.signal_tx.try_send(signal).is_ok()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            warn!(error = %err, "send loop task ended abnormally");
        }
    }
}

async fn send_loop(
    session: Arc<UploadSession>,
    interval: Duration,
    mut signals: mpsc::Receiver<Signal>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, "send loop started");
    run_once(&session, Trigger::Boot).await;

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let trigger = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender が消えたら止める
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => Trigger::Interval,
            Some(signal) = signals.recv() => signal.trigger(),
        };

        run_once(&session, trigger).await;
    }

    info!("send loop stopped");
}

async fn run_once(session: &UploadSession, trigger: Trigger) {
    match session.run_pass(trigger).await {
        Ok(PassOutcome::Completed { report, .. }) if report.failed > 0 => {
            debug!(%trigger, failed = report.failed, "records left for the next pass");
        }
        Ok(_) => {}
        Err(err) => warn!(%trigger, error = %err, "send pass failed"),
    }
}
