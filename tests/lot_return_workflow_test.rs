mod common;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::{DeliveryLine, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, TransactionError, TransactionTrait};
use stateset_lot_returns::{
    config::{LotSelectionPolicy, ReturnSettings},
    entities::{product::Tracking, stock_picking::PickingState},
    errors::ServiceError,
    events::Event,
    models::{LotTracking, QtyPrecision, ReturnLine, ReturnWizard},
    repositories::DbStockLedger,
    services::{
        lot_reconciler::{assign_lots, commit_return, expand_return_lines, CommitOutcome},
        DbReturnPickingHost, ReturnPickingHost,
    },
};
use uuid::Uuid;

/// Runs the standard routine, then fails as a later step would.
struct FailingHost<'a, C>(DbReturnPickingHost<'a, C>);

#[async_trait]
impl<'a, C> ReturnPickingHost for FailingHost<'a, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn default_return_lines(
        &self,
        picking_id: Uuid,
        precision: QtyPrecision,
    ) -> Result<Vec<ReturnLine>, ServiceError> {
        self.0.default_return_lines(picking_id, precision).await
    }

    async fn create_returns(&self, wizard: &ReturnWizard) -> Result<Option<Uuid>, ServiceError> {
        self.0.create_returns(wizard).await?;
        Err(ServiceError::InternalError("carrier booking failed".into()))
    }
}

/// Accepts the session without producing a picking.
struct NoPickingHost;

#[async_trait]
impl ReturnPickingHost for NoPickingHost {
    async fn default_return_lines(
        &self,
        _picking_id: Uuid,
        _precision: QtyPrecision,
    ) -> Result<Vec<ReturnLine>, ServiceError> {
        Ok(Vec::new())
    }

    async fn create_returns(&self, _wizard: &ReturnWizard) -> Result<Option<Uuid>, ServiceError> {
        Ok(None)
    }
}

struct SlabDelivery {
    delivery_id: Uuid,
    move_id: Uuid,
    lot_a: Uuid,
    lot_b: Uuid,
}

/// Delivered lots A (10) and B (4) of one tracked product.
async fn slab_delivery(app: &TestApp) -> SlabDelivery {
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let b = app.lot(marble.id, "B").await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0001",
            vec![DeliveryLine::tracked(
                marble.id,
                &[(a.id, dec!(10)), (b.id, dec!(4))],
            )],
        )
        .await;
    SlabDelivery {
        delivery_id: delivery.id,
        move_id: moves[0].id,
        lot_a: a.id,
        lot_b: b.id,
    }
}

#[tokio::test]
async fn offers_every_outstanding_lot_unselected() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;

    let wizard = app.service.open_wizard(d.delivery_id).await.unwrap();

    assert!(wizard.has_lot_products());
    assert_eq!(wizard.lines.len(), 1);
    let line = &wizard.lines[0];
    assert_eq!(line.tracking, LotTracking::Tracked);
    assert_eq!(line.quantity, dec!(0));
    assert!(!line.to_return);
    assert!(line.selected.is_empty());
    assert_eq!(line.lots[&d.lot_a].outstanding_qty, dec!(10));
    assert_eq!(line.lots[&d.lot_b].outstanding_qty, dec!(4));

    let names: Vec<&str> = line
        .lots_by_name()
        .iter()
        .map(|l| l.lot_name.as_str())
        .collect();
    assert_eq!(names, ["A", "B"]);
    let attrs = &line.lots[&d.lot_a].attributes;
    assert_eq!(attrs.block.as_deref(), Some("BLK-A"));
    assert_eq!(attrs.slab_number, Some(7));
}

#[tokio::test]
async fn returns_only_the_selected_lot() {
    let mut app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;

    wizard.select_lots(line_id, [d.lot_b]).unwrap();
    assert_eq!(wizard.lines[0].quantity, dec!(4));

    let result = app.service.create_returns(wizard).await.unwrap();

    let return_id = result.return_picking_id.expect("return picking");
    assert_eq!(result.lots_assigned, 1);
    assert_eq!(result.quantity, dec!(4));

    let return_move = app.return_move_for(return_id, d.move_id).await;
    assert_eq!(return_move.quantity, dec!(4));
    let lines = app.lines_of(return_move.id).await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].lot_id, Some(d.lot_b));
    assert_eq!(lines[0].quantity, dec!(4));

    assert_matches!(app.rx.try_recv(), Ok(Event::ReturnWizardOpened { lot_lines: 1, .. }));
    assert_matches!(
        app.rx.try_recv(),
        Ok(Event::LotReturnCreated { lots_assigned: 1, .. })
    );
}

#[tokio::test]
async fn prior_returns_reduce_outstanding_quantity() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let b = app.lot(marble.id, "B").await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0002",
            vec![DeliveryLine::tracked(
                marble.id,
                &[(a.id, dec!(10)), (b.id, dec!(4))],
            )],
        )
        .await;
    app.done_return(&delivery, &moves[0], &[(a.id, dec!(6))]).await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();

    let lot_a = &wizard.lines[0].lots[&a.id];
    assert_eq!(lot_a.delivered_qty, dec!(10));
    assert_eq!(lot_a.returned_qty, dec!(6));
    assert_eq!(lot_a.outstanding_qty, dec!(4));
    assert_eq!(wizard.lines[0].lots[&b.id].outstanding_qty, dec!(4));
}

#[tokio::test]
async fn fully_returned_lots_and_moves_drop_out() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let granite = app.product("GRANITE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let b = app.lot(marble.id, "B").await;
    let g = app.lot(granite.id, "G").await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0003",
            vec![
                DeliveryLine::tracked(marble.id, &[(a.id, dec!(10)), (b.id, dec!(4))]),
                DeliveryLine::tracked(granite.id, &[(g.id, dec!(3))]),
            ],
        )
        .await;
    app.done_return(&delivery, &moves[0], &[(a.id, dec!(10))]).await;
    app.done_return(&delivery, &moves[1], &[(g.id, dec!(3))]).await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();

    assert_eq!(wizard.lines.len(), 1);
    let line = wizard.line_for_move(moves[0].id).expect("marble line");
    assert_eq!(line.lots.len(), 1);
    assert!(line.lots.contains_key(&b.id));
    assert!(wizard.line_for_move(moves[1].id).is_none());
}

#[tokio::test]
async fn empty_selection_is_rejected_without_writes() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let before = app.picking_count().await;

    let err = app.service.create_returns(wizard).await.unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("at least one lot"));
    assert_eq!(app.picking_count().await, before);
}

#[tokio::test]
async fn untracked_products_pass_through() {
    let app = TestApp::new().await;
    let tiles = app.product("TILE", Tracking::Untracked).await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0004",
            vec![DeliveryLine::untracked(tiles.id, dec!(5))],
        )
        .await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();

    assert!(!wizard.has_lot_products());
    let line = &wizard.lines[0];
    assert_eq!(line.tracking, LotTracking::NotTracked);
    assert_eq!(line.quantity, dec!(5));
    assert!(line.lots.is_empty());

    let result = app.service.create_returns(wizard).await.unwrap();
    assert_eq!(result.lots_assigned, 0);
    let return_move = app
        .return_move_for(result.return_picking_id.unwrap(), moves[0].id)
        .await;
    let lines = app.lines_of(return_move.id).await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].lot_id, None);
    assert_eq!(lines[0].quantity, dec!(5));
}

#[tokio::test]
async fn tracked_move_without_lot_lines_is_unresolved() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let (delivery, _) = app
        .done_delivery(
            "WH/OUT/0005",
            vec![DeliveryLine::untracked(marble.id, dec!(3))],
        )
        .await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();

    let line = &wizard.lines[0];
    assert_eq!(line.tracking, LotTracking::Unresolved);
    assert_eq!(line.quantity, dec!(3));
    assert!(!wizard.has_lot_products());
    assert!(wizard.lot_assignments().is_empty());
}

#[tokio::test]
async fn open_delivery_keeps_default_lines() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let (delivery, _) = app
        .delivery_in_state(
            "WH/OUT/0006",
            PickingState::Assigned,
            vec![DeliveryLine::tracked(marble.id, &[(a.id, dec!(2))])],
        )
        .await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();

    assert_eq!(wizard.lines[0].tracking, LotTracking::NotTracked);
    assert!(wizard.lines[0].lots.is_empty());
    assert_eq!(wizard.lines[0].quantity, dec!(2));
}

#[tokio::test]
async fn missing_picking_leaves_host_lines_untouched() {
    let app = TestApp::new().await;
    let ledger = DbStockLedger::new(app.conn());
    let host_lines = vec![ReturnLine::new(
        Some(Uuid::new_v4()),
        Uuid::new_v4(),
        "unit",
        dec!(1),
    )];

    let lines = expand_return_lines(
        &ledger,
        Uuid::new_v4(),
        host_lines.clone(),
        app.service.settings(),
    )
    .await
    .unwrap();

    assert_eq!(lines, host_lines);
}

#[tokio::test]
async fn excluded_lot_line_is_left_out_of_the_return() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let tiles = app.product("TILE", Tracking::Untracked).await;
    let a = app.lot(marble.id, "A").await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0007",
            vec![
                DeliveryLine::tracked(marble.id, &[(a.id, dec!(10))]),
                DeliveryLine::untracked(tiles.id, dec!(3)),
            ],
        )
        .await;
    let mut wizard = app.service.open_wizard(delivery.id).await.unwrap();
    let marble_line = wizard.line_for_move(moves[0].id).unwrap().id;
    wizard.select_lots(marble_line, [a.id]).unwrap();
    wizard.set_to_return(marble_line, false).unwrap();

    let result = app.service.create_returns(wizard).await.unwrap();

    let return_moves = app.moves_of(result.return_picking_id.unwrap()).await;
    assert_eq!(return_moves.len(), 1);
    assert_eq!(return_moves[0].origin_returned_move_id, Some(moves[1].id));
    assert_eq!(result.lots_assigned, 0);
    assert_eq!(result.quantity, dec!(3));
}

#[tokio::test]
async fn partial_lot_quantities_are_conserved() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;
    wizard.select_lots(line_id, [d.lot_a, d.lot_b]).unwrap();
    wizard.set_lot_quantity(line_id, d.lot_a, dec!(2.5)).unwrap();

    let result = app.service.create_returns(wizard).await.unwrap();

    let return_move = app
        .return_move_for(result.return_picking_id.unwrap(), d.move_id)
        .await;
    let lines = app.lines_of(return_move.id).await;
    assert_eq!(lines.len(), 2);
    let total: rust_decimal::Decimal = lines.iter().map(|l| l.quantity).sum();
    assert_eq!(total, dec!(6.5));
    assert_eq!(return_move.quantity, dec!(6.5));
    assert!(lines.iter().all(|l| l.lot_id.is_some()));
}

#[tokio::test]
async fn select_all_policy_returns_everything_outstanding() {
    let app = TestApp::selecting_all().await;
    let d = slab_delivery(&app).await;

    let wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    assert_eq!(wizard.lines[0].quantity, dec!(14));

    let result = app.service.create_returns(wizard).await.unwrap();
    assert_eq!(result.lots_assigned, 2);
}

#[tokio::test]
async fn only_validated_returns_count_as_returned() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;
    wizard.select_lots(line_id, [d.lot_a]).unwrap();
    wizard.set_lot_quantity(line_id, d.lot_a, dec!(2.5)).unwrap();
    let return_id = app
        .service
        .create_returns(wizard)
        .await
        .unwrap()
        .return_picking_id
        .unwrap();

    let pending = app.service.open_wizard(d.delivery_id).await.unwrap();
    assert_eq!(pending.lines[0].lots[&d.lot_a].outstanding_qty, dec!(10));

    let validated = app.service.validate_return(return_id).await.unwrap();
    assert_eq!(validated.state, PickingState::Done);

    let after = app.service.open_wizard(d.delivery_id).await.unwrap();
    assert_eq!(after.lines[0].lots[&d.lot_a].outstanding_qty, dec!(7.5));
    assert_eq!(after.lines[0].lots[&d.lot_b].outstanding_qty, dec!(4));
}

#[tokio::test]
async fn validating_requires_an_open_picking() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;

    let err = app.service.validate_return(d.delivery_id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let err = app.service.validate_return(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn only_return_pickings_can_be_validated() {
    let app = TestApp::new().await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let (delivery, moves) = app
        .delivery_in_state(
            "WH/OUT/0009",
            PickingState::Assigned,
            vec![DeliveryLine::tracked(marble.id, &[(a.id, dec!(2))])],
        )
        .await;

    let err = app.service.validate_return(delivery.id).await.unwrap_err();

    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg.contains("not a return"));
    assert!(app
        .moves_of(delivery.id)
        .await
        .iter()
        .all(|m| m.state == moves[0].state));
}

#[tokio::test]
async fn coarse_precision_returns_exactly_what_was_delivered() {
    let app = TestApp::with_settings(ReturnSettings {
        precision: QtyPrecision::new(0),
        default_selection: LotSelectionPolicy::All,
    })
    .await;
    let marble = app.product("MARBLE", Tracking::Lot).await;
    let a = app.lot(marble.id, "A").await;
    let (delivery, moves) = app
        .done_delivery(
            "WH/OUT/0010",
            vec![DeliveryLine::tracked(marble.id, &[(a.id, dec!(2.5))])],
        )
        .await;

    let wizard = app.service.open_wizard(delivery.id).await.unwrap();
    assert_eq!(wizard.lines[0].lots[&a.id].outstanding_qty, dec!(2.5));
    assert_eq!(wizard.lines[0].quantity, dec!(2.5));

    let return_id = app
        .service
        .create_returns(wizard)
        .await
        .unwrap()
        .return_picking_id
        .unwrap();

    let return_move = app.return_move_for(return_id, moves[0].id).await;
    let lines = app.lines_of(return_move.id).await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, dec!(2.5));
}

#[tokio::test]
async fn host_failure_rolls_back_the_return() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;
    wizard.select_lots(line_id, [d.lot_a]).unwrap();
    let before = app.picking_count().await;

    let res = app
        .db
        .transaction::<_, CommitOutcome, ServiceError>(move |txn| {
            Box::pin(async move {
                let ledger = DbStockLedger::new(txn);
                let host = FailingHost(DbReturnPickingHost::new(txn));
                commit_return(&ledger, &host, &wizard).await
            })
        })
        .await;

    assert_matches!(
        res,
        Err(TransactionError::Transaction(ServiceError::InternalError(_)))
    );
    assert_eq!(app.picking_count().await, before);
}

#[tokio::test]
async fn no_return_picking_means_no_lot_assignment() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;
    wizard.select_lots(line_id, [d.lot_a]).unwrap();
    let ledger = DbStockLedger::new(app.conn());

    let outcome = commit_return(&ledger, &NoPickingHost, &wizard).await.unwrap();

    assert_eq!(
        outcome,
        CommitOutcome {
            return_picking_id: None,
            lot_lines_created: 0,
        }
    );
}

#[tokio::test]
async fn stale_return_picking_is_ignored() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;
    let mut wizard = app.service.open_wizard(d.delivery_id).await.unwrap();
    let line_id = wizard.lines[0].id;
    wizard.select_lots(line_id, [d.lot_b]).unwrap();
    let ledger = DbStockLedger::new(app.conn());

    let created = assign_lots(
        &ledger,
        Uuid::new_v4(),
        &wizard.lot_assignments(),
        QtyPrecision::default(),
    )
    .await
    .unwrap();

    assert_eq!(created, 0);
}

#[tokio::test]
async fn reopening_computes_the_same_outstanding_lots() {
    let app = TestApp::new().await;
    let d = slab_delivery(&app).await;

    let first = app.service.open_wizard(d.delivery_id).await.unwrap();
    let second = app.service.open_wizard(d.delivery_id).await.unwrap();

    assert_eq!(first.lines[0].lots, second.lines[0].lots);
}
