//! One scan cycle: progress, API call, result or error.
//!
//! Both the coordinator and the popup drive scans through [`run_cycle`], so
//! endpoint selection and the overlay sequence are identical for menu and
//! manual scans.

use crate::agent::AgentRegistry;
use crate::api::{ApiError, ScanApi};
use crate::model::{ScanRequest, ScanResult};
use crate::protocol::{Message, Reply};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs `request` to completion. Overlay delivery problems are logged and
/// never abort the scan; the API outcome is returned to the caller.
pub async fn run_cycle(
    api: &dyn ScanApi,
    agents: &AgentRegistry,
    request: &ScanRequest,
    settle: Duration,
) -> Result<ScanResult, ApiError> {
    info!(
        "{} scan {} started for {}",
        request.mode, request.cycle, request.url
    );

    if let Err(e) = agents.ensure(request.tab, settle).await {
        warn!("No page agent for {}: {}", request.tab, e);
    }

    deliver(
        agents,
        request,
        Message::ShowProgress {
            url: request.url.clone(),
            mode: request.mode,
            cycle: Some(request.cycle),
        },
    )
    .await;

    match api.scan(&request.url, request.mode).await {
        Ok(result) => {
            debug!("Scan {} returned {:?}", request.cycle, result.threat_level());
            deliver(
                agents,
                request,
                Message::ShowResult {
                    url: request.url.clone(),
                    result: result.clone(),
                    mode: request.mode,
                    cycle: Some(request.cycle),
                },
            )
            .await;
            Ok(result)
        }
        Err(e) => {
            warn!("Scan {} failed: {}", request.cycle, e);
            deliver(
                agents,
                request,
                Message::ShowError {
                    message: e.to_string(),
                    cycle: Some(request.cycle),
                },
            )
            .await;
            Err(e)
        }
    }
}

async fn deliver(agents: &AgentRegistry, request: &ScanRequest, message: Message) {
    let action = message.action();
    match agents.send(request.tab, message).await {
        Ok(Reply::Failed { error }) => {
            warn!("Page agent in {} could not show {}: {}", request.tab, action, error)
        }
        Ok(_) => {}
        Err(e) => warn!("Could not deliver {} to {}: {}", action, request.tab, e),
    }
}
