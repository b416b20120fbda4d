//! Fast touch injection through the companion agent.
//!
//! A session owns one agent process and one TCP connection to it. Taps are
//! written as raw touch records; the agent never answers after its readiness
//! byte. The agent is killed and reaped when the session is dropped.

use std::net::SocketAddr;
use std::process::Child;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use nonopaint_core::error::SolverError;
use nonopaint_core::geometry::Point;
use nonopaint_core::touch::{encode_tap, ScreenSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::agent::AgentLauncher;

/// Interval between polls of the agent process while waiting for it to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default time the agent gets to exit on its own after the socket closes.
pub const AGENT_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Launching,
    AwaitingReady,
    Ready,
    Closed,
}

/// How long to keep dialing the agent before giving up.
///
/// With neither an attempt cap nor a timeout the session retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub retry_interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(100),
            max_attempts: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ConnectPolicy {
    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.timeout.is_some_and(|limit| elapsed >= limit)
    }

    fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.timeout.map(|limit| limit.saturating_sub(elapsed))
    }
}

pub struct TouchSession {
    state: SessionState,
    screen: ScreenSize,
    stream: Option<TcpStream>,
    agent: Option<Child>,
    exit_timeout: Duration,
}

impl TouchSession {
    /// Launch the agent and wait until it accepts touch events.
    pub async fn start<L: AgentLauncher>(
        launcher: &L,
        screen: ScreenSize,
        policy: &ConnectPolicy,
    ) -> Result<Self> {
        let mut session = Self {
            state: SessionState::Disconnected,
            screen,
            stream: None,
            agent: None,
            exit_timeout: AGENT_EXIT_TIMEOUT,
        };

        session.transition(SessionState::Launching);
        launcher.deploy().await.context("Failed to deploy agent")?;
        let addr = launcher.forward().await.context("Failed to forward agent socket")?;
        session.agent = Some(launcher.spawn().context("Failed to start agent")?);

        session.transition(SessionState::AwaitingReady);
        let stream = session.await_ready(addr, policy).await?;
        session.stream = Some(stream);
        session.transition(SessionState::Ready);

        Ok(session)
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Override how long `close` waits for the agent before killing it.
    #[cfg(test)]
    pub fn with_exit_timeout(mut self, exit_timeout: Duration) -> Self {
        self.exit_timeout = exit_timeout;
        self
    }

    fn transition(&mut self, next: SessionState) {
        debug!("touch session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Dial until the agent sends its readiness byte or the policy runs out.
    async fn await_ready(&mut self, addr: SocketAddr, policy: &ConnectPolicy) -> Result<TcpStream> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            if let Some(agent) = self.agent.as_mut() {
                match agent.try_wait() {
                    Ok(Some(status)) if !status.success() => {
                        bail!(
                            "Agent exited with status {} before becoming ready (check the device log for scrcpy errors)",
                            status
                        );
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Error checking agent status: {}", e),
                }
            }

            attempts += 1;
            let attempt = match policy.remaining(start.elapsed()) {
                Some(remaining) => timeout(remaining, handshake(addr))
                    .await
                    .unwrap_or_else(|_| {
                        Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "handshake timed out",
                        ))
                    }),
                None => handshake(addr).await,
            };

            match attempt {
                Ok(stream) => {
                    info!(
                        "Agent ready after {} attempts ({:?})",
                        attempts,
                        start.elapsed()
                    );
                    return Ok(stream);
                }
                Err(e) => debug!("Connection attempt {} failed: {}", attempts, e),
            }

            if policy.exhausted(attempts, start.elapsed()) {
                return Err(SolverError::connection_failed(attempts, start.elapsed()).into());
            }
            tokio::time::sleep(policy.retry_interval).await;
        }
    }

    /// Press at `point`, hold, release.
    pub async fn tap(&mut self, point: Point, hold: Duration) -> Result<()> {
        if self.state != SessionState::Ready {
            bail!("Touch session is not ready (state: {:?})", self.state);
        }
        let stream = self
            .stream
            .as_mut()
            .context("Touch session has no connection")?;

        let (down, up) = encode_tap(point, self.screen);
        debug!("tap ({}, {}) hold {:?}", point.x, point.y, hold);
        stream
            .write_all(&down)
            .await
            .context("Failed to write touch-down event")?;
        tokio::time::sleep(hold).await;
        stream
            .write_all(&up)
            .await
            .context("Failed to write touch-up event")?;
        Ok(())
    }

    /// Close the connection and wait for the agent to exit.
    ///
    /// The agent gets `exit_timeout` to notice the closed socket; after that
    /// it is killed.
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Failed to shut down agent connection: {}", e);
            }
        }

        if let Some(mut agent) = self.agent.take() {
            let deadline = Instant::now() + self.exit_timeout;
            loop {
                match agent.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Agent exited with {}", status);
                        break;
                    }
                    Ok(None) if Instant::now() < deadline => {
                        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                    }
                    Ok(None) => {
                        warn!("Agent still running after {:?}, killing it", self.exit_timeout);
                        agent.kill().context("Failed to kill agent")?;
                        agent.wait().context("Failed to reap agent")?;
                        break;
                    }
                    Err(e) => {
                        kill_and_reap(&mut agent);
                        return Err(e).context("Failed to wait for agent");
                    }
                }
            }
        }

        self.transition(SessionState::Closed);
        info!("Touch session closed");
        Ok(())
    }
}

impl Drop for TouchSession {
    fn drop(&mut self) {
        // Reached on error paths; `close` leaves nothing behind.
        if let Some(mut agent) = self.agent.take() {
            kill_and_reap(&mut agent);
        }
    }
}

/// Best-effort kill followed by a blocking reap.
fn kill_and_reap(agent: &mut Child) {
    if let Err(e) = agent.kill() {
        debug!("Failed to kill agent (may have already exited): {}", e);
    }
    if let Err(e) = agent.wait() {
        debug!("Failed to reap agent: {}", e);
    }
}

async fn handshake(addr: SocketAddr) -> std::io::Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut ready = [0u8; 1];
    stream.read_exact(&mut ready).await?;
    Ok(stream)
}
