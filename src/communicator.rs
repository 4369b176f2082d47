/// Communicator
///
/// Launches the wallet surface with an encoded request and correlates the
/// callback URL that eventually comes back. There is no connection: every
/// segment is its own launch, and responses are matched purely by id.
///
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use url::Url;

use crate::encoding::{decode_response_url_params, reassemble_segments, request_url, segment_request};
use crate::error::{Error, Result};
use crate::message::{Content, MessageId, RequestMessage, ResponseMessage, Segment};
use crate::utils::url_params;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The surface closed normally. When it handed back the callback URL
    /// directly, it is fed to [`Communicator::handle_response`].
    Success { return_url: Option<String> },
    /// The user dismissed the surface.
    Cancel,
}

/// Opens the wallet's browser or app surface. Provided by the host.
#[async_trait]
pub trait WalletLauncher: Send + Sync {
    /// Opens `url`. Resolves once the surface has closed or redirected to
    /// `return_scheme`.
    async fn launch(&self, url: Url, return_scheme: &str) -> Result<LaunchOutcome>;

    /// Force-closes any open surface.
    fn dismiss(&self);
}

type Responder = oneshot::Sender<Result<ResponseMessage>>;

#[derive(Default)]
struct PendingRequests {
    /// Logical request id -> waiter for the terminal response.
    responses: HashMap<MessageId, Responder>,
    /// Segment message id -> logical request id.
    segment_owners: HashMap<MessageId, MessageId>,
    /// Segment message id -> waiter for the wallet's ack.
    segment_acks: HashMap<MessageId, oneshot::Sender<()>>,
    /// Logical request id -> response segments received so far, by index.
    inbound_segments: HashMap<MessageId, BTreeMap<usize, Segment>>,
}

impl PendingRequests {
    fn owner_of(&self, id: &MessageId) -> MessageId {
        self.segment_owners.get(id).unwrap_or(id).clone()
    }

    fn forget(&mut self, request_id: &MessageId) {
        self.responses.remove(request_id);
        self.inbound_segments.remove(request_id);
        let segments = self
            .segment_owners
            .iter()
            .filter(|(_, owner)| *owner == request_id)
            .map(|(segment, _)| segment.clone())
            .collect::<Vec<_>>();
        for segment in segments {
            self.segment_owners.remove(&segment);
            self.segment_acks.remove(&segment);
        }
    }

    fn resolve(&mut self, request_id: &MessageId, response: Result<ResponseMessage>) -> bool {
        self.inbound_segments.remove(request_id);
        match self.responses.remove(request_id) {
            Some(responder) => {
                let _ = responder.send(response);
                true
            }
            None => false,
        }
    }
}

pub struct Communicator {
    launcher: Arc<dyn WalletLauncher>,
    pending: Mutex<PendingRequests>,
    /// Held for a whole round trip; only one wallet surface is open at a time.
    surface: tokio::sync::Mutex<()>,
    response_timeout: Option<Duration>,
    segment_dismiss_delay: Duration,
}

impl Communicator {
    pub fn new(
        launcher: Arc<dyn WalletLauncher>,
        response_timeout: Option<Duration>,
        segment_dismiss_delay: Duration,
    ) -> Self {
        Self {
            launcher,
            pending: Mutex::new(PendingRequests::default()),
            surface: tokio::sync::Mutex::new(()),
            response_timeout,
            segment_dismiss_delay,
        }
    }

    /// Sends `request` to the wallet at `wallet_url`, one segment at a time,
    /// and waits for the terminal response. Concurrent callers queue up
    /// behind the single wallet surface.
    pub async fn post_request_and_wait_for_response(
        &self,
        request: RequestMessage,
        wallet_url: &str,
    ) -> Result<ResponseMessage> {
        let _surface = self.surface.lock().await;

        let segments = segment_request(&request)?;
        let (responder, mut response) = oneshot::channel();
        self.pending
            .lock()
            .responses
            .insert(request.id.clone(), responder);

        let exchange = self.exchange(&request.id, segments, wallet_url, &mut response);
        let result = match self.response_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("request {} timed out after {timeout:?}", request.id);
                    Err(Error::RequestTimeout)
                }
            },
            None => exchange.await,
        };

        self.pending.lock().forget(&request.id);
        result
    }

    async fn exchange(
        &self,
        request_id: &MessageId,
        segments: Vec<RequestMessage>,
        wallet_url: &str,
        response: &mut oneshot::Receiver<Result<ResponseMessage>>,
    ) -> Result<ResponseMessage> {
        let total = segments.len();
        for (position, message) in segments.into_iter().enumerate() {
            let is_last = position + 1 == total;
            let ack = {
                let mut pending = self.pending.lock();
                if message.id != *request_id {
                    pending
                        .segment_owners
                        .insert(message.id.clone(), request_id.clone());
                }
                if is_last {
                    None
                } else {
                    let (ack_tx, ack_rx) = oneshot::channel();
                    pending.segment_acks.insert(message.id.clone(), ack_tx);
                    Some(ack_rx)
                }
            };

            if total > 1 {
                debug!("sending segment {}/{total} of {request_id}", position + 1);
            }
            self.launch(&message, wallet_url).await?;

            if let Some(ack) = ack {
                tokio::select! {
                    acked = ack => acked.map_err(|_| Error::user_rejected_request())?,
                    early = &mut *response => return settle(early),
                }
                tokio::time::sleep(self.segment_dismiss_delay).await;
            }
        }
        settle(response.await)
    }

    async fn launch(&self, message: &RequestMessage, wallet_url: &str) -> Result<()> {
        let url = request_url(wallet_url, message)?;
        match self.launcher.launch(url, &message.callback_url).await {
            Ok(LaunchOutcome::Success {
                return_url: Some(return_url),
            }) => {
                if !self.handle_response(&return_url) {
                    warn!("surface returned an unmatched callback for {}", message.id);
                }
                Ok(())
            }
            Ok(LaunchOutcome::Success { return_url: None }) => Ok(()),
            Ok(LaunchOutcome::Cancel) => {
                info!("user cancelled request {}", message.id);
                self.launcher.dismiss();
                Err(Error::user_rejected_request())
            }
            Err(e) => {
                warn!("failed to open wallet surface: {e}");
                self.launcher.dismiss();
                Err(Error::user_rejected_request())
            }
        }
    }

    /// Feeds a callback URL from the wallet. Returns whether it matched a
    /// pending request or segment; stale and duplicate callbacks return
    /// `false`, except a repeated response segment, which is absorbed.
    pub fn handle_response(&self, url: &str) -> bool {
        let response = match Url::parse(url)
            .map_err(Error::from)
            .and_then(|url| decode_response_url_params(&url_params(&url)))
        {
            Ok(response) => response,
            Err(e) => {
                warn!("ignoring malformed wallet callback: {e}");
                return false;
            }
        };
        debug!(
            "wallet response {} for {} ({})",
            response.id,
            response.request_id,
            response.content.kind()
        );

        self.launcher.dismiss();

        let mut pending = self.pending.lock();
        match &response.content {
            Content::Segment(segment) if segment.is_ack() => {
                match pending.segment_acks.remove(&response.request_id) {
                    Some(ack) => {
                        let _ = ack.send(());
                        true
                    }
                    None => false,
                }
            }
            Content::Segment(Segment::Ack { .. }) => {
                warn!("ignoring negative segment ack for {}", response.request_id);
                false
            }
            Content::Segment(part @ Segment::Data { total_size, index, .. }) => {
                let owner = pending.owner_of(&response.request_id);
                if !pending.responses.contains_key(&owner) {
                    return false;
                }
                let parts = pending.inbound_segments.entry(owner.clone()).or_default();
                if parts.contains_key(index) {
                    debug!("duplicate response segment {index} for {owner}");
                    return true;
                }
                parts.insert(*index, part.clone());
                let received = parts
                    .values()
                    .map(|p| match p {
                        Segment::Data { data, .. } => data.len(),
                        Segment::Ack { .. } => 0,
                    })
                    .sum::<usize>();
                if received < *total_size {
                    return true;
                }

                let parts = parts.values().cloned().collect::<Vec<_>>();
                let reassembled = reassemble_segments(&parts).map(|encrypted| ResponseMessage {
                    content: Content::Encrypted(encrypted),
                    request_id: owner.clone(),
                    ..response.clone()
                });
                pending.resolve(&owner, reassembled)
            }
            Content::Failure(_) | Content::Encrypted(_) => {
                let owner = pending.owner_of(&response.request_id);
                pending.resolve(&owner, Ok(response))
            }
            Content::Handshake(_) => false,
        }
    }

    /// Closes the surface and abandons everything pending. Waiters observe a
    /// user rejection.
    pub fn disconnect(&self) {
        self.launcher.dismiss();
        let mut pending = self.pending.lock();
        pending.responses.clear();
        pending.segment_owners.clear();
        pending.segment_acks.clear();
        pending.inbound_segments.clear();
    }

    /// Whether a request or segment with this id still awaits the wallet.
    pub fn is_pending(&self, id: &MessageId) -> bool {
        let pending = self.pending.lock();
        pending.responses.contains_key(id) || pending.segment_acks.contains_key(id)
    }
}

fn settle(
    received: std::result::Result<Result<ResponseMessage>, oneshot::error::RecvError>,
) -> Result<ResponseMessage> {
    received.unwrap_or_else(|_| Err(Error::user_rejected_request()))
}
