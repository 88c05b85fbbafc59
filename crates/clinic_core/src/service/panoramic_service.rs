//! Panoramic (dashboard) read model.

use crate::access::{authorize, ClinicOperation, Principal};
use crate::repo::{BoxBoardRow, PanoramicRepository, WaitingRow};
use crate::service::error::ClinicResult;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanoramicView {
    pub boxes: Vec<BoxBoardRow>,
    pub waiting: Vec<WaitingRow>,
}

pub struct PanoramicService<S> {
    store: S,
}

impl<S: PanoramicRepository> PanoramicService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn panoramic(&self, actor: &Principal) -> ClinicResult<PanoramicView> {
        authorize(actor, ClinicOperation::Panoramic)?;
        Ok(PanoramicView {
            boxes: self.store.box_board()?,
            waiting: self.store.waiting_queue()?,
        })
    }
}
