use crate::discovery::{ServiceAdvertiser, OSCJSON_SERVICE_TYPE, OSC_SERVICE_TYPE};
use crate::dispatcher::{bind_udp, OscDispatcher};
use crate::http::{query_app, QueryState};
use oscq_core::{ControlSignal, HostInfo, OscQueryError, ProtocolRouter, ServerBuilder, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How long `stop` waits for open HTTP/WebSocket connections to drain.
const HTTP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// An OSCQuery server: one UDP socket for OSC, one TCP port for HTTP and
/// WebSocket, plus the feedback tick and the rebuild control task.
pub struct OscQueryServer {
    config: ServerConfig,
    router: Arc<ProtocolRouter>,
    advertiser: Option<Arc<dyn ServiceAdvertiser>>,
}

impl OscQueryServer {
    /// Builds the router (and its first snapshot) from the builder.
    pub fn from_builder(builder: ServerBuilder) -> Self {
        let router = builder.build_router();
        Self {
            config: builder.config,
            router,
            advertiser: None,
        }
    }

    /// Serves an existing router.
    pub fn with_router(config: ServerConfig, router: Arc<ProtocolRouter>) -> Self {
        Self {
            config,
            router,
            advertiser: None,
        }
    }

    pub fn with_advertiser(mut self, advertiser: Arc<dyn ServiceAdvertiser>) -> Self {
        self.advertiser = Some(advertiser);
        self
    }

    pub fn router(&self) -> &Arc<ProtocolRouter> {
        &self.router
    }

    /// Binds both transports and spawns every background task.
    ///
    /// A transport that fails to bind is logged and left down while the other
    /// keeps running; only when neither binds is the error returned.
    pub async fn start(self) -> Result<ServerHandle, OscQueryError> {
        let osc_addr = self.config.osc_addr()?;
        let http_addr = self.config.http_addr()?;
        tracing::info!("OscQueryServer: starting '{}' (OSC {}, HTTP {})", self.config.name, osc_addr, http_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut failures = Vec::new();

        let mut udp = None;
        match bind_udp(osc_addr, self.config.recv_buffer_size).and_then(|socket| {
            let local = socket.local_addr()?;
            Ok((socket, local))
        }) {
            Ok((socket, local)) => {
                let dispatcher = OscDispatcher::new(socket, Arc::clone(&self.router), shutdown_rx.clone());
                tracing::info!("OscQueryServer: OSC listening on udp://{}", local);
                udp = Some((local, tokio::spawn(dispatcher.run_loop())));
            }
            Err(source) => {
                let err = OscQueryError::TransportBind {
                    transport: "udp",
                    addr: osc_addr.to_string(),
                    source,
                };
                tracing::error!("OscQueryServer: {}", err);
                failures.push(err);
            }
        }

        let osc_port = udp.as_ref().map_or(self.config.osc_port, |(addr, _)| addr.port());
        let host_info = Arc::new(HostInfo::new(self.config.name.clone(), osc_port));

        let mut http = None;
        match bind_tcp(http_addr).await {
            Ok((listener, local)) => {
                let app = query_app(QueryState {
                    router: Arc::clone(&self.router),
                    host_info,
                    shutdown: shutdown_rx.clone(),
                });
                let mut signal = shutdown_rx.clone();
                let task = tokio::spawn(async move {
                    let served = axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            while !*signal.borrow() {
                                if signal.changed().await.is_err() {
                                    break;
                                }
                            }
                        })
                        .await;
                    if let Err(e) = served {
                        tracing::error!("OscQueryServer: HTTP server failed: {}", e);
                    }
                });
                tracing::info!("OscQueryServer: HTTP/WS listening on http://{}", local);
                http = Some((local, task));
            }
            Err(source) => {
                let err = OscQueryError::TransportBind {
                    transport: "http",
                    addr: http_addr.to_string(),
                    source,
                };
                tracing::error!("OscQueryServer: {}", err);
                failures.push(err);
            }
        }

        if udp.is_none() && http.is_none() {
            let _ = shutdown_tx.send(true);
            return Err(failures.remove(0));
        }

        let tick = (self.config.feedback_interval_ms > 0).then(|| {
            let period = Duration::from_millis(self.config.feedback_interval_ms);
            tokio::spawn(run_feedback(Arc::clone(&self.router), period, shutdown_rx.clone()))
        });

        let (control_tx, control_rx) = mpsc::channel(16);
        let control = tokio::spawn(run_control(Arc::clone(&self.router), control_rx, shutdown_rx));

        if let Some(advertiser) = &self.advertiser {
            if let Some((addr, _)) = &udp {
                advertise(advertiser.as_ref(), &self.config.name, OSC_SERVICE_TYPE, addr.port());
            }
            if let Some((addr, _)) = &http {
                advertise(advertiser.as_ref(), &self.config.name, OSCJSON_SERVICE_TYPE, addr.port());
            }
        }

        Ok(ServerHandle {
            name: self.config.name,
            router: self.router,
            advertiser: self.advertiser,
            shutdown_tx,
            control_tx,
            udp,
            http,
            tick,
            control,
        })
    }
}

async fn bind_tcp(addr: SocketAddr) -> std::io::Result<(tokio::net::TcpListener, SocketAddr)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

fn advertise(advertiser: &dyn ServiceAdvertiser, name: &str, service_type: &str, port: u16) {
    match advertiser.advertise(name, service_type, port) {
        Ok(()) => tracing::info!("OscQueryServer: advertised {} on port {}", service_type, port),
        Err(e) => tracing::warn!("OscQueryServer: could not advertise {}: {}", service_type, e),
    }
}

async fn run_feedback(router: Arc<ProtocolRouter>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let sent = router.tick();
                if sent > 0 {
                    tracing::trace!("Feedback: {} packet(s) queued", sent);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Rebuilds run on the blocking pool. Requests that pile up while one is
/// running collapse into a single rebuild.
async fn run_control(
    router: Arc<ProtocolRouter>,
    mut control_rx: mpsc::Receiver<ControlSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            signal = control_rx.recv() => match signal {
                Some(ControlSignal::Rebuild) => {
                    let mut stop = false;
                    while let Ok(next) = control_rx.try_recv() {
                        stop |= next == ControlSignal::Shutdown;
                    }
                    let router = Arc::clone(&router);
                    if let Err(e) = tokio::task::spawn_blocking(move || router.rebuild_snapshot()).await {
                        tracing::error!("Control: rebuild task failed: {}", e);
                    }
                    if stop {
                        break;
                    }
                }
                Some(ControlSignal::Shutdown) | None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// A running server.
pub struct ServerHandle {
    name: String,
    router: Arc<ProtocolRouter>,
    advertiser: Option<Arc<dyn ServiceAdvertiser>>,
    shutdown_tx: watch::Sender<bool>,
    control_tx: mpsc::Sender<ControlSignal>,
    udp: Option<(SocketAddr, JoinHandle<()>)>,
    http: Option<(SocketAddr, JoinHandle<()>)>,
    tick: Option<JoinHandle<()>>,
    control: JoinHandle<()>,
}

impl ServerHandle {
    /// Bound OSC address, `None` when the UDP transport failed to bind.
    pub fn osc_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().map(|(addr, _)| *addr)
    }

    /// Bound HTTP/WebSocket address, `None` when it failed to bind.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().map(|(addr, _)| *addr)
    }

    /// Names of the transports that are up.
    pub fn listening(&self) -> Vec<&'static str> {
        let mut up = Vec::new();
        if self.udp.is_some() {
            up.push("udp");
        }
        if self.http.is_some() {
            up.push("http");
        }
        up
    }

    pub fn router(&self) -> &Arc<ProtocolRouter> {
        &self.router
    }

    /// Queues a rebuild without waiting for it. Returns `false` once the
    /// server is stopping.
    pub fn request_rebuild(&self) -> bool {
        match self.control_tx.try_send(ControlSignal::Rebuild) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Stops every task. The UDP socket is closed and no message is
    /// dispatched once this returns.
    pub async fn stop(self) {
        tracing::info!("OscQueryServer: stopping '{}'", self.name);
        let _ = self.shutdown_tx.send(true);
        let _ = self.control_tx.try_send(ControlSignal::Shutdown);

        if let Some((_, task)) = self.udp {
            if let Err(e) = task.await {
                tracing::error!("OscQueryServer: UDP task ended abnormally: {}", e);
            }
        }

        if let Some((_, mut task)) = self.http {
            if tokio::time::timeout(HTTP_DRAIN_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("OscQueryServer: HTTP connections did not drain in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }

        if let Some(tick) = self.tick {
            let _ = tick.await;
        }
        let _ = self.control.await;

        self.router.close_all_connections();

        if let Some(advertiser) = &self.advertiser {
            advertiser.withdraw(&self.name, OSC_SERVICE_TYPE);
            advertiser.withdraw(&self.name, OSCJSON_SERVICE_TYPE);
        }
        tracing::info!("OscQueryServer: stopped");
    }
}
