// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Share enumeration and printer filtering.

use tracing::{debug, instrument};

use sharespool_core::config::FilterConfig;
use sharespool_core::error::Result;
use sharespool_core::types::ShareDescriptor;

use crate::transport::SmbSession;

/// List every share on the server with a single remote call.
///
/// An empty list is a valid answer. Failures are returned as-is; retrying is
/// the caller's business.
#[instrument(skip_all)]
pub async fn list_shares<S: SmbSession>(session: &S) -> Result<Vec<ShareDescriptor>> {
    let shares = session.list_shares().await?;
    debug!(count = shares.len(), "shares enumerated");
    Ok(shares)
}

/// Keep print queues that are not on the exclusion list, in input order.
pub fn filter_printers(shares: &[ShareDescriptor], filter: &FilterConfig) -> Vec<ShareDescriptor> {
    shares
        .iter()
        .filter(|s| s.type_code == filter.printer_type_code)
        .filter(|s| !filter.excluded_share_names.contains(&s.name))
        .cloned()
        .collect()
}
