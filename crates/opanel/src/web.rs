use crate::ui;
use actix_web::{get, http::StatusCode, middleware::Logger, web, App, HttpResponse, HttpServer};
use opanel_client::panel::{DEFAULT_LIMIT, DEFAULT_TICKER, LIMIT_RANGE};
use opanel_client::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::{error, info};

const PANEL_TEMPLATE: &str = include_str!("../templates/panel.html");

/// Shared by every worker: the two upstream sources and the compiled template.
pub struct AppState {
    contracts: Arc<dyn ContractSource>,
    prices: Arc<dyn PriceSource>,
    templates: Tera,
}

impl AppState {
    pub fn new(
        contracts: Arc<dyn ContractSource>,
        prices: Arc<dyn PriceSource>,
    ) -> anyhow::Result<Self> {
        let mut templates = Tera::default();
        templates.add_raw_template("panel.html", PANEL_TEMPLATE)?;
        Ok(AppState {
            contracts,
            prices,
            templates,
        })
    }

    pub fn polygon(client: Polygon) -> anyhow::Result<Self> {
        let client = Arc::new(client);
        Self::new(client.clone(), client)
    }

    pub async fn run(&self, query: &PanelQuery) -> Result<Panel, PanelError> {
        let request = query.request()?;
        info!(
            "[{}] fetching up to {} contracts",
            request.ticker(),
            request.limit()
        );
        fetch_panel(&request, self.contracts.as_ref(), self.prices.as_ref()).await
    }
}

/// Raw form input; `limit` stays a string so bad numbers become `InvalidInput`.
#[derive(Deserialize, Debug, Default)]
pub struct PanelQuery {
    pub ticker: Option<String>,
    pub limit: Option<String>,
}

impl PanelQuery {
    pub fn request(&self) -> Result<PanelRequest, PanelError> {
        let ticker = self.ticker.as_deref().unwrap_or_default();
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIMIT,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                PanelError::InvalidInput(format!(
                    "contract count must be a whole number, got {raw:?}"
                ))
            })?,
        };
        PanelRequest::new(ticker, limit)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[get("/")]
async fn index(query: web::Query<PanelQuery>, state: web::Data<AppState>) -> HttpResponse {
    let query = query.into_inner();

    let mut error: Option<String> = None;
    let mut warning: Option<String> = None;
    let mut rows: Vec<[String; 8]> = vec![];
    let mut skipped: Vec<String> = vec![];

    // no ticker means a fresh page load: show the form only
    if query.ticker.is_some() {
        match state.run(&query).await {
            Ok(panel) => {
                match panel.status {
                    PanelStatus::NoContracts => {
                        warning = Some(ui::no_contracts_message(&panel.ticker))
                    }
                    PanelStatus::PricesUnavailable => {
                        error = Some(ui::prices_unavailable_message(&panel))
                    }
                    PanelStatus::Rows => {}
                }
                rows = panel.rows.iter().map(ui::cells).collect();
                skipped = panel.skipped.iter().map(ui::skipped_message).collect();
            }
            Err(e) => error = Some(ui::failure_message(&e)),
        }
    }

    let mut ctx = Context::new();
    ctx.insert("ticker", query.ticker.as_deref().unwrap_or(DEFAULT_TICKER));
    ctx.insert(
        "limit",
        &query
            .limit
            .clone()
            .unwrap_or_else(|| DEFAULT_LIMIT.to_string()),
    );
    ctx.insert("min_limit", LIMIT_RANGE.start());
    ctx.insert("max_limit", LIMIT_RANGE.end());
    ctx.insert("columns", &ui::COLUMNS);
    ctx.insert("error", &error);
    ctx.insert("warning", &warning);
    ctx.insert("rows", &rows);
    ctx.insert("skipped", &skipped);

    match state.templates.render("panel.html", &ctx) {
        Ok(html) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(e) => {
            error!("failed to render panel.html: {e:?}");
            HttpResponse::InternalServerError().body("Template rendering failed")
        }
    }
}

#[get("/api/panel")]
async fn api_panel(query: web::Query<PanelQuery>, state: web::Data<AppState>) -> HttpResponse {
    match state.run(&query).await {
        Ok(panel) => HttpResponse::Ok().json(panel),
        Err(e) => {
            let status = match e {
                PanelError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PanelError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
                PanelError::UpstreamUnavailable(_) | PanelError::UpstreamRejected { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            HttpResponse::build(status).json(json!({
                "error": e.kind(),
                "message": e.to_string(),
            }))
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index).service(api_panel);
}

pub async fn run(bind: &str, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);
    info!("dashboard listening on http://{bind}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes)
    })
    .bind(bind)?
    .run()
    .await
}
