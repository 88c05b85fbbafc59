//! Administrative reset of the clinic floor.
//!
//! The reset is the only writer of box occupancy besides assignment.

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::now_epoch_ms;
use crate::repo::{ArrivalRepository, BoxRepository, UnitOfWork};
use crate::service::error::{ClinicError, ClinicResult};
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub boxes_cleared: usize,
    pub arrivals_closed: usize,
}

pub struct AdminService<S> {
    store: S,
}

impl<S> AdminService<S>
where
    S: BoxRepository + ArrivalRepository + UnitOfWork,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Frees every box and closes every open arrival in one transaction.
    pub fn reset_clinic_day(&self, actor: &Principal) -> ClinicResult<ResetReport> {
        authorize(actor, ClinicOperation::ResetClinicDay)?;
        let report = self.store.atomically(|| -> Result<ResetReport, ClinicError> {
            let now = now_epoch_ms();
            Ok(ResetReport {
                boxes_cleared: self.store.reset_all_boxes(now)?,
                arrivals_closed: self.store.close_all_open_arrivals(now)?,
            })
        })?;
        info!(
            "event=clinic_reset module=service status=ok actor={} boxes_cleared={} arrivals_closed={}",
            actor.id, report.boxes_cleared, report.arrivals_closed
        );
        Ok(report)
    }
}
