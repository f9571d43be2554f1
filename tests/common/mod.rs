#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use stateset_lot_returns::{
    config::{AppConfig, LotSelectionPolicy, ReturnSettings},
    db::{self, DbPool},
    entities::{
        product::{self, Tracking},
        stock_lot,
        stock_move::{self, MoveState},
        stock_move_line,
        stock_picking::{self, PickingState, PickingType},
    },
    events::{self, Event, EventSender},
    services::LotReturnService,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Locations and company shared by every seeded picking.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub stock: Uuid,
    pub customer: Uuid,
    pub company: Uuid,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            stock: Uuid::new_v4(),
            customer: Uuid::new_v4(),
            company: Uuid::new_v4(),
        }
    }
}

/// One delivered product line: the move quantity and its completed lines.
pub struct DeliveryLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub lots: Vec<(Option<Uuid>, Decimal)>,
}

impl DeliveryLine {
    pub fn tracked(product_id: Uuid, lots: &[(Uuid, Decimal)]) -> Self {
        Self {
            product_id,
            quantity: lots.iter().map(|(_, q)| *q).sum(),
            lots: lots.iter().map(|(lot, q)| (Some(*lot), *q)).collect(),
        }
    }

    pub fn untracked(product_id: Uuid, quantity: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            lots: vec![(None, quantity)],
        }
    }
}

/// Helper harness backed by an in-memory SQLite database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub events: Arc<EventSender>,
    pub rx: mpsc::Receiver<Event>,
    pub service: LotReturnService,
    pub site: Site,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(ReturnSettings::default()).await
    }

    pub async fn selecting_all() -> Self {
        Self::with_settings(ReturnSettings {
            default_selection: LotSelectionPolicy::All,
            ..ReturnSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: ReturnSettings) -> Self {
        // A single connection keeps every query on the same in-memory database.
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::connect_from_app_config(&cfg)
            .await
            .expect("in-memory database");
        let db = Arc::new(pool);
        let (sender, rx) = events::channel(cfg.event_channel_capacity);
        let events = Arc::new(sender);
        let service = LotReturnService::new(db.clone(), events.clone(), settings);

        Self {
            db,
            events,
            rx,
            service,
            site: Site::default(),
        }
    }

    pub fn conn(&self) -> &DbPool {
        self.db.as_ref()
    }

    pub async fn product(&self, sku: &str, tracking: Tracking) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("Product {}", sku)),
            uom: Set("m2".to_string()),
            tracking: Set(tracking),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn())
        .await
        .expect("insert product")
    }

    pub async fn lot(&self, product_id: Uuid, name: &str) -> stock_lot::Model {
        stock_lot::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            product_id: Set(product_id),
            block: Set(Some(format!("BLK-{}", name))),
            customs_permit: Set(None),
            thickness: Set(Some("2cm".to_string())),
            height: Set(Some(Decimal::new(180, 2))),
            width: Set(Some(Decimal::new(320, 2))),
            weight: Set(None),
            slab_number: Set(Some(7)),
            bundle: Set(None),
            color: Set(Some("white".to_string())),
            kind: Set(None),
            details: Set(None),
            container: Set(None),
            origin: Set(None),
            supplier: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn())
        .await
        .expect("insert lot")
    }

    async fn picking(
        &self,
        name: &str,
        picking_type: PickingType,
        state: PickingState,
        from: Uuid,
        to: Uuid,
        return_of_id: Option<Uuid>,
    ) -> stock_picking::Model {
        stock_picking::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            picking_type: Set(picking_type),
            state: Set(state),
            location_id: Set(from),
            location_dest_id: Set(to),
            company_id: Set(self.site.company),
            return_of_id: Set(return_of_id),
            created_at: Set(Utc::now()),
            date_done: Set((state == PickingState::Done).then(Utc::now)),
        }
        .insert(self.conn())
        .await
        .expect("insert picking")
    }

    async fn stock_move(
        &self,
        picking: &stock_picking::Model,
        product_id: Uuid,
        quantity: Decimal,
        state: MoveState,
        origin_returned_move_id: Option<Uuid>,
    ) -> stock_move::Model {
        stock_move::ActiveModel {
            id: Set(Uuid::new_v4()),
            picking_id: Set(picking.id),
            product_id: Set(product_id),
            product_uom: Set("m2".to_string()),
            quantity: Set(quantity),
            state: Set(state),
            location_id: Set(picking.location_id),
            location_dest_id: Set(picking.location_dest_id),
            company_id: Set(self.site.company),
            origin_returned_move_id: Set(origin_returned_move_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn())
        .await
        .expect("insert move")
    }

    async fn move_line(
        &self,
        parent: &stock_move::Model,
        lot_id: Option<Uuid>,
        quantity: Decimal,
    ) -> stock_move_line::Model {
        stock_move_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            move_id: Set(parent.id),
            picking_id: Set(parent.picking_id),
            product_id: Set(parent.product_id),
            product_uom: Set(parent.product_uom.clone()),
            lot_id: Set(lot_id),
            quantity: Set(quantity),
            state: Set(parent.state),
            location_id: Set(parent.location_id),
            location_dest_id: Set(parent.location_dest_id),
            company_id: Set(parent.company_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn())
        .await
        .expect("insert move line")
    }

    /// A delivery to the customer in the given state, one move per line.
    pub async fn delivery_in_state(
        &self,
        name: &str,
        state: PickingState,
        lines: Vec<DeliveryLine>,
    ) -> (stock_picking::Model, Vec<stock_move::Model>) {
        let move_state = if state == PickingState::Done {
            MoveState::Done
        } else {
            MoveState::Assigned
        };
        let picking = self
            .picking(
                name,
                PickingType::Outgoing,
                state,
                self.site.stock,
                self.site.customer,
                None,
            )
            .await;

        let mut moves = Vec::new();
        for line in lines {
            let mv = self
                .stock_move(&picking, line.product_id, line.quantity, move_state, None)
                .await;
            for (lot_id, qty) in line.lots {
                self.move_line(&mv, lot_id, qty).await;
            }
            moves.push(mv);
        }
        (picking, moves)
    }

    pub async fn done_delivery(
        &self,
        name: &str,
        lines: Vec<DeliveryLine>,
    ) -> (stock_picking::Model, Vec<stock_move::Model>) {
        self.delivery_in_state(name, PickingState::Done, lines).await
    }

    /// A completed return of `origin_move` sending back the given lots.
    pub async fn done_return(
        &self,
        origin: &stock_picking::Model,
        origin_move: &stock_move::Model,
        lots: &[(Uuid, Decimal)],
    ) -> stock_picking::Model {
        let picking = self
            .picking(
                &format!("{}/RET/manual", origin.name),
                PickingType::Incoming,
                PickingState::Done,
                origin.location_dest_id,
                origin.location_id,
                Some(origin.id),
            )
            .await;
        let quantity = lots.iter().map(|(_, q)| *q).sum();
        let mv = self
            .stock_move(
                &picking,
                origin_move.product_id,
                quantity,
                MoveState::Done,
                Some(origin_move.id),
            )
            .await;
        for (lot_id, qty) in lots {
            self.move_line(&mv, Some(*lot_id), *qty).await;
        }
        picking
    }

    pub async fn picking_count(&self) -> u64 {
        stock_picking::Entity::find()
            .count(self.conn())
            .await
            .expect("count pickings")
    }

    pub async fn moves_of(&self, picking_id: Uuid) -> Vec<stock_move::Model> {
        stock_move::Entity::find()
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .all(self.conn())
            .await
            .expect("load moves")
    }

    pub async fn lines_of(&self, move_id: Uuid) -> Vec<stock_move_line::Model> {
        stock_move_line::Entity::find()
            .filter(stock_move_line::Column::MoveId.eq(move_id))
            .all(self.conn())
            .await
            .expect("load move lines")
    }

    /// The return move created from `origin_move_id` on `picking_id`.
    pub async fn return_move_for(
        &self,
        picking_id: Uuid,
        origin_move_id: Uuid,
    ) -> stock_move::Model {
        self.moves_of(picking_id)
            .await
            .into_iter()
            .find(|m| m.origin_returned_move_id == Some(origin_move_id))
            .expect("return move for origin")
    }
}
