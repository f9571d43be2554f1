//! Lot reconciliation for returns of completed deliveries.
//!
//! Outstanding quantity of lot `L` on delivery move `M` is the completed
//! quantity of `L` on `M` minus the completed quantity of `L` on every done
//! return move whose origin is `M`. Lots with nothing outstanding are never
//! offered.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{LotSelectionPolicy, ReturnSettings},
    entities::stock_move_line::{self, MoveState},
    errors::ServiceError,
    models::{
        LotAssignment, LotAttributes, LotOption, LotTracking, QtyPrecision, ReturnLine,
        ReturnWizard,
    },
    repositories::{NewMoveLine, StockLedger},
    services::return_picking::ReturnPickingHost,
};

/// Quantity per lot id.
pub type LotQuantities = BTreeMap<Uuid, Decimal>;

/// Delivered, returned and outstanding quantity of one lot on one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotBalance {
    pub delivered: Decimal,
    pub returned: Decimal,
    pub outstanding: Decimal,
}

/// Result of committing a return session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub return_picking_id: Option<Uuid>,
    /// Move lines written with a specific lot.
    pub lot_lines_created: usize,
}

/// Sums completed, lot-bearing move lines per lot.
pub fn sum_by_lot<'a, I>(lines: I) -> LotQuantities
where
    I: IntoIterator<Item = &'a stock_move_line::Model>,
{
    let mut totals = LotQuantities::new();
    for line in lines {
        if line.state != MoveState::Done {
            continue;
        }
        if let Some(lot_id) = line.lot_id {
            *totals.entry(lot_id).or_insert(Decimal::ZERO) += line.quantity;
        }
    }
    totals
}

/// Lots with a positive outstanding quantity. The precision only decides
/// whether a lot is still open; `outstanding` is the exact difference.
pub fn outstanding_by_lot(
    delivered: &LotQuantities,
    returned: &LotQuantities,
    precision: QtyPrecision,
) -> BTreeMap<Uuid, LotBalance> {
    delivered
        .iter()
        .filter_map(|(lot_id, delivered)| {
            let returned = returned.get(lot_id).copied().unwrap_or(Decimal::ZERO);
            let outstanding = *delivered - returned;
            precision.is_positive(outstanding).then(|| {
                (
                    *lot_id,
                    LotBalance {
                        delivered: *delivered,
                        returned,
                        outstanding,
                    },
                )
            })
        })
        .collect()
}

pub async fn delivered_by_lot<L>(ledger: &L, move_id: Uuid) -> Result<LotQuantities, ServiceError>
where
    L: StockLedger + ?Sized,
{
    let lines = ledger.done_move_lines(move_id).await?;
    Ok(sum_by_lot(&lines))
}

pub async fn returned_by_lot<L>(
    ledger: &L,
    origin_move_id: Uuid,
) -> Result<LotQuantities, ServiceError>
where
    L: StockLedger + ?Sized,
{
    let mut totals = LotQuantities::new();
    for returned in ledger.returned_moves(origin_move_id).await? {
        let lines = ledger.done_move_lines(returned.id).await?;
        for (lot_id, qty) in sum_by_lot(&lines) {
            *totals.entry(lot_id).or_insert(Decimal::ZERO) += qty;
        }
    }
    Ok(totals)
}

/// Replaces the host's default lines with lot-aware ones.
///
/// Lines of untracked products pass through. Tracked lines become one line
/// offering every outstanding lot; a tracked move whose lots are all returned
/// yields no line at all. Unless `picking_id` is a done picking the host
/// lines are returned untouched.
#[instrument(skip(ledger, host_lines), fields(lines = host_lines.len()))]
pub async fn expand_return_lines<L>(
    ledger: &L,
    picking_id: Uuid,
    host_lines: Vec<ReturnLine>,
    settings: ReturnSettings,
) -> Result<Vec<ReturnLine>, ServiceError>
where
    L: StockLedger + ?Sized,
{
    match ledger.find_picking(picking_id).await? {
        Some(picking) if picking.is_done() => {}
        _ => {
            debug!("Picking missing or not done; keeping default return lines");
            return Ok(host_lines);
        }
    }

    let mut expanded = Vec::with_capacity(host_lines.len());
    for line in host_lines {
        if let Some(line) = expand_line(ledger, line, settings).await? {
            expanded.push(line);
        }
    }
    Ok(expanded)
}

async fn expand_line<L>(
    ledger: &L,
    mut line: ReturnLine,
    settings: ReturnSettings,
) -> Result<Option<ReturnLine>, ServiceError>
where
    L: StockLedger + ?Sized,
{
    let Some(move_id) = line.move_id else {
        return Ok(Some(line));
    };
    let Some(delivery_move) = ledger.find_move(move_id).await? else {
        return Ok(Some(line));
    };

    if !ledger
        .product_tracking(delivery_move.product_id)
        .await?
        .is_lot_tracked()
    {
        line.tracking = LotTracking::NotTracked;
        return Ok(Some(line));
    }

    let delivered = delivered_by_lot(ledger, move_id).await?;
    if delivered.is_empty() {
        warn!(%move_id, "Tracked move has no completed lot lines; leaving line unresolved");
        line.tracking = LotTracking::Unresolved;
        return Ok(Some(line));
    }

    let returned = returned_by_lot(ledger, move_id).await?;
    let balances = outstanding_by_lot(&delivered, &returned, settings.precision);
    if balances.is_empty() {
        debug!(%move_id, "Every lot already returned");
        return Ok(None);
    }

    let lot_ids: Vec<Uuid> = balances.keys().copied().collect();
    let records: HashMap<Uuid, _> = ledger
        .lots(&lot_ids)
        .await?
        .into_iter()
        .map(|lot| (lot.id, lot))
        .collect();

    let options = balances.into_iter().map(|(lot_id, balance)| {
        let record = records.get(&lot_id);
        LotOption {
            lot_id,
            lot_name: record
                .map(|lot| lot.name.clone())
                .unwrap_or_else(|| lot_id.to_string()),
            delivered_qty: balance.delivered,
            returned_qty: balance.returned,
            outstanding_qty: balance.outstanding,
            attributes: record.map(LotAttributes::from).unwrap_or_default(),
        }
    });

    let select_all = settings.default_selection == LotSelectionPolicy::All;
    let line = line.with_lots(options, select_all, settings.precision);
    debug!(
        %move_id,
        lots = line.lots.len(),
        outstanding = %line.outstanding_total(),
        "Return line expanded by lot"
    );
    Ok(Some(line))
}

/// Rejects a session that would return nothing.
pub fn validate_selection(wizard: &ReturnWizard) -> Result<(), ServiceError> {
    if wizard.precision.is_positive(wizard.total_to_return()) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "Select at least one lot or product to return.".to_string(),
        ))
    }
}

/// Validates the session, has the host create the return picking, then
/// rewrites the move lines of lot-tracked return moves one lot at a time.
///
/// Outstanding quantities are those computed when the session was opened.
/// Once another return of the same delivery is validated, reopen the session
/// before committing; a stale session can return a lot a second time.
#[instrument(skip_all, fields(picking_id = %wizard.picking_id))]
pub async fn commit_return<L, H>(
    ledger: &L,
    host: &H,
    wizard: &ReturnWizard,
) -> Result<CommitOutcome, ServiceError>
where
    L: StockLedger + ?Sized,
    H: ReturnPickingHost + ?Sized,
{
    validate_selection(wizard)?;

    let assignments = wizard.lot_assignments();
    let staged = wizard.staged_for_host();
    let return_picking_id = host.create_returns(&staged).await?;

    let lot_lines_created = match return_picking_id {
        Some(picking_id) if !assignments.is_empty() => {
            assign_lots(ledger, picking_id, &assignments, wizard.precision).await?
        }
        _ => 0,
    };

    Ok(CommitOutcome {
        return_picking_id,
        lot_lines_created,
    })
}

/// Swaps the generic lines of each return move for one line per assigned
/// lot. `assignments` is keyed by the delivery move a return move came from;
/// return moves without an entry are left alone. A picking that no longer
/// exists is skipped.
pub async fn assign_lots<L>(
    ledger: &L,
    return_picking_id: Uuid,
    assignments: &BTreeMap<Uuid, Vec<LotAssignment>>,
    precision: QtyPrecision,
) -> Result<usize, ServiceError>
where
    L: StockLedger + ?Sized,
{
    if ledger.find_picking(return_picking_id).await?.is_none() {
        warn!(%return_picking_id, "Return picking vanished before lot assignment");
        return Ok(0);
    }

    let mut created = 0;
    for return_move in ledger.moves_of_picking(return_picking_id).await? {
        let Some(lots) = return_move
            .origin_returned_move_id
            .and_then(|origin| assignments.get(&origin))
        else {
            continue;
        };

        let removed = ledger.delete_move_lines(return_move.id).await?;
        debug!(move_id = %return_move.id, removed, "Generic return move lines removed");

        for assignment in lots {
            if !precision.is_positive(assignment.quantity) {
                continue;
            }
            ledger
                .create_move_line(NewMoveLine::for_lot(
                    &return_move,
                    assignment.lot_id,
                    assignment.quantity,
                ))
                .await?;
            created += 1;
        }
    }
    Ok(created)
}
