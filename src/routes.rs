use std::ops::DerefMut;

use actix_request_identifier::RequestId;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::database::connect::DbPool;
use crate::database::{discount, gift, purchase, wallet};
use crate::errors::EconomyError;
use crate::gateway::{PaymentGateway, WebhookEvent};
use crate::responses;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// The upstream auth layer authenticates the session and forwards the user's
/// id in this header; nothing in this service touches credentials.
const USER_HEADER: &str = "x-user-id";

fn caller(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize, Debug)]
pub struct PageQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

impl PageQuery {
    fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(0).max(0);
        let per_page = self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, per_page)
    }
}

#[derive(Deserialize, Debug)]
pub struct OpenPurchaseInput {
    package_id: i64,
    discount_code: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SendGiftInput {
    receiver_id: String,
    gift_id: i64,
    stream_id: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ValidateDiscountInput {
    code: String,
    package_id: i64,
}

/// Runs a blocking economy operation on the diesel pool and renders the
/// outcome: validation kinds become structured 4xx bodies, database errors
/// become logged 500s.
async fn run_economy<T, F>(db: web::Data<DbPool>, op: F) -> Result<HttpResponse, Box<dyn std::error::Error>>
where
    T: serde::Serialize + Send + 'static,
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, EconomyError> + Send + 'static,
{
    let mut conn = db.get()?;
    let res = web::block(move || op(conn.deref_mut()))
        .await
        .map_err(anyhow::Error::from)?;
    match res {
        Ok(data) => Ok(responses::ok_json(data)),
        Err(e) if e.is_validation() => Ok(responses::economy_error_http_response(&e)),
        Err(e) => {
            error!("{e}");
            Ok(responses::economy_error_http_response(&e))
        }
    }
}

#[get("/wallet")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn wallet_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    run_economy(db, move |conn| wallet::get_or_create(conn, &user_id)).await
}

#[get("/packages")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn packages_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    run_economy(db, purchase::active_packages).await
}

#[post("/purchase")]
#[instrument(skip(db, gateway), fields(request_id = request_id.as_str()))]
pub async fn open_purchase_handler(
    db: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    request_id: RequestId,
    req: HttpRequest,
    input: web::Json<OpenPurchaseInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let input = input.into_inner();
    let gateway = gateway.get_ref().clone();
    run_economy(db, move |conn| {
        let (purchase, session) =
            purchase::open_purchase(conn, &gateway, &user_id, input.package_id, input.discount_code.as_deref())?;
        Ok(serde_json::json!({
            "order_id": purchase.order_id,
            "total_coins": purchase.total_coins,
            "amount": purchase.amount,
            "currency": purchase.currency,
            "checkout": session,
        }))
    })
    .await
}

#[get("/purchases")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn purchases_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let (page, per_page) = query.resolve();
    run_economy(db, move |conn| purchase::purchases_for(conn, &user_id, page, per_page)).await
}

#[get("/gifts")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn gifts_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    run_economy(db, gift::active_gifts).await
}

#[post("/gift")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn send_gift_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
    input: web::Json<SendGiftInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let input = input.into_inner();
    run_economy(db, move |conn| {
        gift::send_gift(
            conn,
            &user_id,
            &input.receiver_id,
            input.gift_id,
            input.stream_id.as_deref(),
            input.message.as_deref(),
        )
    })
    .await
}

#[get("/gifts-sent")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn gifts_sent_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let (page, per_page) = query.resolve();
    run_economy(db, move |conn| gift::gifts_sent(conn, &user_id, page, per_page)).await
}

#[get("/gifts-received")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn gifts_received_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let (page, per_page) = query.resolve();
    run_economy(db, move |conn| gift::gifts_received(conn, &user_id, page, per_page)).await
}

#[post("/discount/validate")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn validate_discount_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
    input: web::Json<ValidateDiscountInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    let input = input.into_inner();
    if input.code.trim().is_empty() {
        return Ok(responses::bad_parameter_http_response("code"));
    }
    run_economy(db, move |conn| {
        discount::validate(conn, input.code.trim(), input.package_id, &user_id).map(|(_, preview)| preview)
    })
    .await
}

#[get("/discount/my-codes")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn my_codes_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    run_economy(db, move |conn| {
        discount::codes_owned_by(conn, &user_id).map_err(EconomyError::from)
    })
    .await
}

#[get("/discount/latest-reward")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn latest_reward_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    req: HttpRequest,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = match caller(&req) {
        Some(u) => u,
        None => return Ok(responses::bad_parameter_http_response(USER_HEADER)),
    };
    run_economy(db, move |conn| {
        discount::latest_reward(conn, &user_id).map_err(EconomyError::from)
    })
    .await
}

/// Payment-gateway webhook. Signature verification happens upstream at the
/// edge; here the payload is normalized, settled, and acknowledged. The
/// response is 200 no matter what happened internally — the gateway retries
/// on anything else and a poison event would retry forever.
#[post("/webhook/payments")]
#[instrument(skip(db, body), fields(request_id = request_id.as_str()))]
pub async fn payment_webhook_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    body: web::Bytes,
) -> HttpResponse {
    // parsed by hand, not via the Json extractor: an extractor rejection would
    // answer 4xx and the gateway would retry an unparsable event forever
    let payload = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("webhook dropped, unparsable payload: {e}");
            return responses::webhook_ack();
        }
    };
    let event = WebhookEvent::from_payload(payload);

    let conn = db.get();
    let mut conn = match conn {
        Ok(conn) => conn,
        Err(e) => {
            error!("webhook dropped, no db connection: {e}");
            return responses::webhook_ack();
        }
    };
    let res = web::block(move || purchase::settle(conn.deref_mut(), &event)).await;
    match res {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("webhook settlement error: {e}"),
        Err(e) => error!("webhook settlement panicked: {e}"),
    }
    responses::webhook_ack()
}
