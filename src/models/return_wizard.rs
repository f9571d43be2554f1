//! Transient state of a return wizard session.
//!
//! A session holds one [`ReturnLine`] per delivered product line. Lines for
//! lot-tracked products carry a side-table of every lot still outstanding on
//! the delivery move, and the user's selection of lots and per-lot quantities.
//! Every mutation recomputes the line from that selection, so applying the
//! same change twice leaves the line unchanged.

use crate::{entities::stock_lot, errors::ServiceError, models::quantity::QtyPrecision};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// How a return line relates to lot tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotTracking {
    /// Product is not lot or serial tracked.
    NotTracked,
    /// Product is tracked and the line offers per-lot selection.
    Tracked,
    /// Product is tracked but the delivery move has no completed lot lines.
    Unresolved,
}

/// Descriptive lot data shown next to each selectable lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotAttributes {
    pub block: Option<String>,
    pub customs_permit: Option<String>,
    pub thickness: Option<String>,
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub slab_number: Option<i32>,
    pub bundle: Option<String>,
    pub color: Option<String>,
    pub kind: Option<String>,
    pub details: Option<String>,
    pub container: Option<String>,
    pub origin: Option<String>,
    pub supplier: Option<String>,
}

impl From<&stock_lot::Model> for LotAttributes {
    fn from(lot: &stock_lot::Model) -> Self {
        Self {
            block: lot.block.clone(),
            customs_permit: lot.customs_permit.clone(),
            thickness: lot.thickness.clone(),
            height: lot.height,
            width: lot.width,
            weight: lot.weight,
            slab_number: lot.slab_number,
            bundle: lot.bundle.clone(),
            color: lot.color.clone(),
            kind: lot.kind.clone(),
            details: lot.details.clone(),
            container: lot.container.clone(),
            origin: lot.origin.clone(),
            supplier: lot.supplier.clone(),
        }
    }
}

/// A lot that can still be returned on a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotOption {
    pub lot_id: Uuid,
    pub lot_name: String,
    /// Completed quantity of this lot on the delivery move.
    pub delivered_qty: Decimal,
    /// Completed quantity already sent back by earlier returns.
    pub returned_qty: Decimal,
    /// `delivered_qty - returned_qty`, always positive for an offered lot.
    pub outstanding_qty: Decimal,
    pub attributes: LotAttributes,
}

/// Quantity of one lot to send back on a return move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAssignment {
    pub lot_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub id: Uuid,
    /// Delivery move this line returns from.
    pub move_id: Option<Uuid>,
    pub product_id: Uuid,
    pub product_uom: String,
    /// Proposed quantity handed to the return routine.
    pub quantity: Decimal,
    /// Quantity restored when the line is included again after exclusion.
    pub reference_qty: Decimal,
    pub tracking: LotTracking,
    pub to_return: bool,
    /// Outstanding lots keyed by lot id.
    pub lots: BTreeMap<Uuid, LotOption>,
    /// Selected lots and the quantity chosen for each.
    pub selected: BTreeMap<Uuid, Decimal>,
}

impl ReturnLine {
    /// A plain line as the standard return wizard proposes it.
    pub fn new(
        move_id: Option<Uuid>,
        product_id: Uuid,
        product_uom: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            move_id,
            product_id,
            product_uom: product_uom.into(),
            quantity,
            reference_qty: quantity,
            tracking: LotTracking::NotTracked,
            to_return: quantity > Decimal::ZERO,
            lots: BTreeMap::new(),
            selected: BTreeMap::new(),
        }
    }

    /// Turns a plain line into a lot-selection line over `lots`.
    pub fn with_lots(
        mut self,
        lots: impl IntoIterator<Item = LotOption>,
        select_all: bool,
        precision: QtyPrecision,
    ) -> Self {
        self.tracking = LotTracking::Tracked;
        self.lots = lots.into_iter().map(|lot| (lot.lot_id, lot)).collect();
        self.selected = if select_all {
            self.lots
                .values()
                .map(|lot| (lot.lot_id, lot.outstanding_qty))
                .collect()
        } else {
            BTreeMap::new()
        };
        self.recompute(precision);
        self
    }

    pub fn is_lot_managed(&self) -> bool {
        self.tracking == LotTracking::Tracked
    }

    pub fn selected_total(&self) -> Decimal {
        self.selected.values().copied().sum()
    }

    pub fn outstanding_total(&self) -> Decimal {
        self.lots.values().map(|lot| lot.outstanding_qty).sum()
    }

    /// Offered lots in display order.
    pub fn lots_by_name(&self) -> Vec<&LotOption> {
        let mut lots: Vec<&LotOption> = self.lots.values().collect();
        lots.sort_by(|a, b| a.lot_name.cmp(&b.lot_name));
        lots
    }

    /// Replaces the lot selection. Lots that stay selected keep their chosen
    /// quantity; newly selected lots start at their outstanding quantity.
    pub fn select_lots<I>(&mut self, lot_ids: I, precision: QtyPrecision) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = Uuid>,
    {
        self.ensure_lot_managed()?;

        let wanted: BTreeSet<Uuid> = lot_ids.into_iter().collect();
        let mut selection = BTreeMap::new();
        for lot_id in wanted {
            let lot = self.offered(lot_id)?;
            let qty = self
                .selected
                .get(&lot_id)
                .copied()
                .unwrap_or(lot.outstanding_qty);
            selection.insert(lot_id, qty);
        }

        self.selected = selection;
        self.recompute(precision);
        Ok(())
    }

    /// Sets the quantity of one lot. Zero deselects the lot; anything above
    /// the lot's outstanding quantity is rejected. The stored quantity is
    /// capped at the outstanding quantity even where rounding would exceed it.
    pub fn set_lot_quantity(
        &mut self,
        lot_id: Uuid,
        quantity: Decimal,
        precision: QtyPrecision,
    ) -> Result<(), ServiceError> {
        self.ensure_lot_managed()?;
        let outstanding = self.offered(lot_id)?.outstanding_qty;

        if quantity < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity for lot {} cannot be negative",
                lot_id
            )));
        }
        if precision.compare(quantity, outstanding) == std::cmp::Ordering::Greater {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity {} for lot {} exceeds the outstanding {}",
                quantity, lot_id, outstanding
            )));
        }

        if precision.is_positive(quantity) {
            self.selected
                .insert(lot_id, precision.round(quantity).min(outstanding));
        } else {
            self.selected.remove(&lot_id);
        }
        self.recompute(precision);
        Ok(())
    }

    /// Includes or excludes the line. Exclusion zeroes the quantity but keeps
    /// the selection, so including it again restores the computed total.
    pub fn set_to_return(&mut self, include: bool) {
        self.to_return = include;
        self.quantity = if include {
            self.reference_qty
        } else {
            Decimal::ZERO
        };
    }

    /// Edits the quantity of a line without lot selection.
    pub fn set_quantity(
        &mut self,
        quantity: Decimal,
        precision: QtyPrecision,
    ) -> Result<(), ServiceError> {
        if self.is_lot_managed() {
            return Err(ServiceError::InvalidOperation(
                "Quantity of a lot-tracked line follows its lot selection".to_string(),
            ));
        }
        if quantity < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Return quantity cannot be negative".to_string(),
            ));
        }
        self.quantity = quantity;
        self.reference_qty = quantity;
        self.to_return = precision.is_positive(quantity);
        Ok(())
    }

    /// Quantity this line contributes to the return.
    pub fn returning_qty(&self, precision: QtyPrecision) -> Decimal {
        let qty = match self.tracking {
            LotTracking::Tracked if !self.to_return => Decimal::ZERO,
            _ => self.quantity,
        };
        if precision.is_positive(qty) {
            qty
        } else {
            Decimal::ZERO
        }
    }

    /// Per-lot quantities to write on the return move, if the line is included.
    pub fn assignments(&self, precision: QtyPrecision) -> Vec<LotAssignment> {
        if !self.is_lot_managed() || !self.to_return {
            return Vec::new();
        }
        self.selected
            .iter()
            .filter(|(_, qty)| precision.is_positive(**qty))
            .map(|(lot_id, qty)| LotAssignment {
                lot_id: *lot_id,
                quantity: *qty,
            })
            .collect()
    }

    fn recompute(&mut self, precision: QtyPrecision) {
        self.reference_qty = self.selected_total();
        self.quantity = self.reference_qty;
        self.to_return = precision.is_positive(self.quantity);
    }

    fn ensure_lot_managed(&self) -> Result<(), ServiceError> {
        if self.is_lot_managed() {
            Ok(())
        } else {
            Err(ServiceError::InvalidOperation(format!(
                "Return line {} does not offer lot selection",
                self.id
            )))
        }
    }

    fn offered(&self, lot_id: Uuid) -> Result<&LotOption, ServiceError> {
        self.lots.get(&lot_id).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "Lot {} is not available for return on line {}",
                lot_id, self.id
            ))
        })
    }
}

/// One return session for a completed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnWizard {
    pub picking_id: Uuid,
    pub precision: QtyPrecision,
    pub lines: Vec<ReturnLine>,
}

impl ReturnWizard {
    pub fn new(picking_id: Uuid, precision: QtyPrecision, lines: Vec<ReturnLine>) -> Self {
        Self {
            picking_id,
            precision,
            lines,
        }
    }

    pub fn has_lot_products(&self) -> bool {
        self.lines.iter().any(ReturnLine::is_lot_managed)
    }

    pub fn line(&self, line_id: Uuid) -> Option<&ReturnLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    /// First line returning from the given delivery move.
    pub fn line_for_move(&self, move_id: Uuid) -> Option<&ReturnLine> {
        self.lines.iter().find(|line| line.move_id == Some(move_id))
    }

    fn line_mut(&mut self, line_id: Uuid) -> Result<&mut ReturnLine, ServiceError> {
        self.lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Return line {} not found", line_id)))
    }

    pub fn select_lots<I>(&mut self, line_id: Uuid, lot_ids: I) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let precision = self.precision;
        self.line_mut(line_id)?.select_lots(lot_ids, precision)
    }

    pub fn set_lot_quantity(
        &mut self,
        line_id: Uuid,
        lot_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        let precision = self.precision;
        self.line_mut(line_id)?
            .set_lot_quantity(lot_id, quantity, precision)
    }

    pub fn set_to_return(&mut self, line_id: Uuid, include: bool) -> Result<(), ServiceError> {
        self.line_mut(line_id)?.set_to_return(include);
        Ok(())
    }

    pub fn set_quantity(&mut self, line_id: Uuid, quantity: Decimal) -> Result<(), ServiceError> {
        let precision = self.precision;
        self.line_mut(line_id)?.set_quantity(quantity, precision)
    }

    /// Sum of every positive quantity the session would return.
    pub fn total_to_return(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| line.returning_qty(self.precision))
            .sum()
    }

    /// Lot assignments grouped by the delivery move they return from.
    pub fn lot_assignments(&self) -> BTreeMap<Uuid, Vec<LotAssignment>> {
        let mut by_move: BTreeMap<Uuid, Vec<LotAssignment>> = BTreeMap::new();
        for line in &self.lines {
            let Some(move_id) = line.move_id else {
                continue;
            };
            let assignments = line.assignments(self.precision);
            if !assignments.is_empty() {
                by_move.entry(move_id).or_default().extend(assignments);
            }
        }
        by_move
    }

    /// The session as the standard return routine should see it: excluded
    /// lot lines at zero, included ones at their selected total.
    pub fn staged_for_host(&self) -> ReturnWizard {
        let mut staged = self.clone();
        for line in staged.lines.iter_mut().filter(|l| l.is_lot_managed()) {
            line.quantity = if line.to_return {
                line.selected_total()
            } else {
                Decimal::ZERO
            };
        }
        staged
    }
}
