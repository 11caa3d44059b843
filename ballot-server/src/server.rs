use actix_cors::Cors;
use actix_web::{
    error::{InternalError, JsonPayloadError},
    http::StatusCode,
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use ballot_engine::{
    fallback::FallbackResolver,
    gateway::LedgerGateway,
    service::{BallotRequest, BallotService, Mode, PollSnapshot},
    BallotError,
};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, OneOrMany};
use tracing::{debug, warn};

use crate::config::SslConfig;

const DEFAULT_POLL_ID: u32 = 1;
const ICON: &str = "https://example.com/voting-icon.jpg";

pub struct Server<G, F> {
    service: web::Data<BallotService<G, F>>,
}

impl<G, F> Server<G, F>
where
    G: LedgerGateway + Send + Sync + 'static,
    F: FallbackResolver + Send + Sync + 'static,
{
    pub fn new(service: BallotService<G, F>) -> Self {
        Self {
            service: web::Data::new(service),
        }
    }

    pub async fn execute(
        self,
        addrs: &str,
        ssl_config: Option<SslConfig>,
        workers: usize,
    ) -> std::io::Result<()> {
        let service = self.service;

        let server = HttpServer::new(move || {
            App::new()
                .app_data(service.clone())
                .wrap(Cors::permissive())
                .wrap(actix_web::middleware::Compress::default())
                .configure(routes::<G, F>)
        });

        let server = match ssl_config {
            Some(ssl_config) => {
                let mut ssl_builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
                ssl_builder.set_private_key_file(ssl_config.key, SslFiletype::PEM)?;
                ssl_builder.set_certificate_chain_file(ssl_config.cert)?;
                server.bind_openssl(addrs, ssl_builder)?
            }
            None => server.bind(addrs)?,
        };

        server.workers(workers).run().await
    }
}

pub(crate) fn routes<G, F>(cfg: &mut web::ServiceConfig)
where
    G: LedgerGateway + 'static,
    F: FallbackResolver + 'static,
{
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(
            web::resource("/api/vote")
                .route(web::get().to(get_poll::<G, F>))
                .route(web::post().to(post_vote::<G, F>)),
        )
        .service(web::resource("/api/vote/close").route(web::post().to(post_close::<G, F>)))
        .service(web::resource("/api/vote/debug-poll").route(web::get().to(get_debug::<G, F>)));
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollQuery {
    #[serde(rename = "pollId")]
    poll_id: Option<String>,
}

impl PollQuery {
    fn poll_id(&self) -> Result<u32, BallotError> {
        match self.poll_id.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_POLL_ID),
            Some(raw) => raw.parse().map_err(|_| BallotError::InvalidPollId),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    name: &'static str,
    code: u32,
}

fn status_of(err: &BallotError) -> StatusCode {
    match err {
        BallotError::PollNotFound(_) => StatusCode::NOT_FOUND,
        BallotError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &BallotError) -> HttpResponse {
    warn!("request failed: {}", err);
    HttpResponse::build(status_of(err)).json(ErrorBody {
        error: err.to_string(),
        name: err.name(),
        code: err.code(),
    })
}

fn respond<T: Serialize>(res: Result<T, BallotError>) -> HttpResponse {
    match res {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(err) => error_response(&err),
    }
}

/// Bodies that fail to deserialize get the same error shape as the rest.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let resp = error_response(&BallotError::MalformedRequest(err.to_string()));
    InternalError::from_response(err, resp).into()
}

#[derive(Debug, Serialize)]
struct ActionParameter {
    name: &'static str,
    label: String,
    required: bool,
}

#[derive(Debug, Serialize)]
struct LinkedAction {
    label: &'static str,
    href: String,
    #[serde(rename = "type")]
    kind: &'static str,
    parameters: Vec<ActionParameter>,
}

#[derive(Debug, Serialize)]
struct ActionLinks {
    actions: Vec<LinkedAction>,
}

/// Solana Actions metadata with the poll fields flattened alongside.
#[derive(Debug, Serialize)]
struct ActionGetResponse {
    icon: &'static str,
    label: &'static str,
    links: ActionLinks,
    #[serde(flatten)]
    poll: PollSnapshot,
}

impl From<PollSnapshot> for ActionGetResponse {
    fn from(poll: PollSnapshot) -> Self {
        let (label, action_label) = match poll.mode {
            Mode::Ledger => ("Vote", "Cast Your Votes"),
            Mode::Simulated => ("Vote (Demo Mode)", "Cast Your Votes (Demo)"),
        };
        let parameters = vec![
            ActionParameter {
                name: "plusVotes",
                label: format!(
                    "Select up to {} candidates for positive votes",
                    poll.plus_votes_allowed
                ),
                required: true,
            },
            ActionParameter {
                name: "minusVotes",
                label: format!(
                    "Select up to {} candidates for negative votes (optional)",
                    poll.minus_votes_allowed
                ),
                required: false,
            },
        ];
        Self {
            icon: ICON,
            label,
            links: ActionLinks {
                actions: vec![LinkedAction {
                    label: action_label,
                    href: format!("/api/vote?pollId={}", poll.poll_id),
                    kind: "post",
                    parameters,
                }],
            },
            poll,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionData {
    #[serde_as(as = "Option<OneOrMany<_>>")]
    #[serde(rename = "plusVotes")]
    plus_votes: Option<Vec<String>>,
    #[serde_as(as = "Option<OneOrMany<_>>")]
    #[serde(rename = "minusVotes")]
    minus_votes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VoteBody {
    #[serde(rename_all = "camelCase")]
    Direct {
        voter_identity: String,
        #[serde(default)]
        positive_candidate_addresses: Vec<String>,
        #[serde(default)]
        negative_candidate_addresses: Vec<String>,
    },
    /// Solana Actions `ActionPostRequest`.
    Action {
        account: String,
        #[serde(default)]
        data: ActionData,
    },
}

impl VoteBody {
    fn into_request(self, poll_id: u32) -> BallotRequest {
        match self {
            Self::Direct {
                voter_identity,
                positive_candidate_addresses,
                negative_candidate_addresses,
            } => BallotRequest {
                poll_id,
                voter: voter_identity,
                plus: positive_candidate_addresses,
                minus: negative_candidate_addresses,
            },
            Self::Action { account, data } => BallotRequest {
                poll_id,
                voter: account,
                plus: data.plus_votes.unwrap_or_default(),
                minus: data.minus_votes.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloseBody {
    account: String,
}

async fn get_poll<G: LedgerGateway + 'static, F: FallbackResolver + 'static>(
    service: web::Data<BallotService<G, F>>,
    query: web::Query<PollQuery>,
) -> HttpResponse {
    let res = match query.poll_id() {
        Ok(poll_id) => service
            .describe_poll(poll_id)
            .await
            .map(ActionGetResponse::from),
        Err(err) => Err(err),
    };
    respond(res)
}

async fn post_vote<G: LedgerGateway + 'static, F: FallbackResolver + 'static>(
    service: web::Data<BallotService<G, F>>,
    query: web::Query<PollQuery>,
    body: web::Json<VoteBody>,
) -> HttpResponse {
    let poll_id = match query.poll_id() {
        Ok(poll_id) => poll_id,
        Err(err) => return respond::<()>(Err(err)),
    };
    let req = body.into_inner().into_request(poll_id);
    debug!(
        "ballot for poll {} from {}: {} plus, {} minus",
        poll_id,
        req.voter,
        req.plus.len(),
        req.minus.len()
    );
    respond(service.cast_ballot(&req).await)
}

async fn post_close<G: LedgerGateway + 'static, F: FallbackResolver + 'static>(
    service: web::Data<BallotService<G, F>>,
    query: web::Query<PollQuery>,
    body: web::Json<CloseBody>,
) -> HttpResponse {
    let res = match query.poll_id() {
        Ok(poll_id) => service.close_voter_record(poll_id, &body.account).await,
        Err(err) => Err(err),
    };
    respond(res)
}

async fn get_debug<G: LedgerGateway + 'static, F: FallbackResolver + 'static>(
    service: web::Data<BallotService<G, F>>,
    query: web::Query<PollQuery>,
) -> HttpResponse {
    let res = match query.poll_id() {
        Ok(poll_id) => Ok(service.diagnose(poll_id).await),
        Err(err) => Err(err),
    };
    respond(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header::ContentType, test as actix_test};
    use anchor_lang::prelude::Pubkey;
    use ballot_engine::{
        fallback::StaticFallback,
        gateway::MemoryLedger,
        service::ServiceConfig,
        state::Poll,
    };
    use serde_json::{json, Value};

    fn ledger(program_id: Pubkey) -> MemoryLedger {
        ["Ann", "Ben", "Cid", "Dee"].iter().fold(
            MemoryLedger::new(program_id).with_poll(Poll {
                poll_id: 3,
                poll_description: "Council".into(),
                poll_start: 0,
                poll_end: u64::MAX,
                candidate_count: 0,
                winners: 1,
                plus_votes_allowed: 2,
                minus_votes_allowed: 1,
            }),
            |ledger, name| ledger.with_candidate(3, name, 0, 0),
        )
    }

    macro_rules! app {
        ($program_id:expr) => {
            actix_test::init_service(
                App::new()
                    .app_data(web::Data::new(BallotService::new(
                        ledger($program_id),
                        StaticFallback::builtin(),
                        ServiceConfig::default(),
                    )))
                    .wrap(Cors::permissive())
                    .configure(routes::<MemoryLedger, StaticFallback>),
            )
            .await
        };
    }

    #[test]
    fn test_poll_query() {
        let q = |raw: Option<&str>| {
            PollQuery {
                poll_id: raw.map(String::from),
            }
            .poll_id()
        };
        assert_eq!(q(None), Ok(1));
        assert_eq!(q(Some("")), Ok(1));
        assert_eq!(q(Some(" 7 ")), Ok(7));
        assert_eq!(q(Some("abc")), Err(BallotError::InvalidPollId));
        assert_eq!(q(Some("-1")), Err(BallotError::InvalidPollId));
    }

    #[test]
    fn test_vote_body_shapes() {
        let direct: VoteBody = serde_json::from_value(json!({
            "voterIdentity": "V",
            "positiveCandidateAddresses": ["A", "B"],
            "negativeCandidateAddresses": ["C"],
        }))
        .unwrap();
        let req = direct.into_request(4);
        assert_eq!((req.voter.as_str(), req.plus.len(), req.minus.len()), ("V", 2, 1));

        let single: VoteBody = serde_json::from_value(json!({
            "account": "V",
            "data": { "plusVotes": "A" },
        }))
        .unwrap();
        let req = single.into_request(1);
        assert_eq!(req.plus, ["A"]);
        assert!(req.minus.is_empty());

        let bare: VoteBody = serde_json::from_value(json!({ "account": "V" })).unwrap();
        assert!(bare.into_request(1).plus.is_empty());
    }

    #[actix_web::test]
    async fn test_get_poll_modes() {
        let app = app!(Pubkey::new_unique());

        let req = actix_test::TestRequest::get().uri("/api/vote?pollId=3").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mode"], "ledger");
        assert_eq!(body["label"], "Vote");
        assert_eq!(body["candidates"].as_array().unwrap().len(), 4);
        assert_eq!(body["links"]["actions"][0]["href"], "/api/vote?pollId=3");

        let req = actix_test::TestRequest::get().uri("/api/vote").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mode"], "simulated");
        assert_eq!(body["plusVotesAllowed"], 2);
        assert_eq!(body["candidates"][0]["name"], "Alice - Education");

        let req = actix_test::TestRequest::get().uri("/api/vote?pollId=x").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["name"], "InvalidPollId");
        assert_eq!(body["code"], 7000);

        let req = actix_test::TestRequest::get().uri("/api/vote?pollId=9").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_post_vote() {
        let program_id = Pubkey::new_unique();
        let app = app!(program_id);
        let deriver = ballot_engine::address::AddressDeriver::new(program_id);
        let cand = |poll_id, name| deriver.candidate(poll_id, name).unwrap().to_string();
        let voter = Pubkey::new_unique().to_string();

        let req = actix_test::TestRequest::post()
            .uri("/api/vote?pollId=3")
            .set_json(json!({
                "voterIdentity": &voter,
                "positiveCandidateAddresses": [cand(3, "Ann"), cand(3, "Ben")],
                "negativeCandidateAddresses": [cand(3, "Cid")],
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["mode"], "ledger");
        assert!(body["transaction"].as_str().is_some_and(|t| !t.is_empty()));

        let req = actix_test::TestRequest::post()
            .uri("/api/vote?pollId=3")
            .set_json(json!({
                "account": &voter,
                "data": { "plusVotes": cand(3, "Ann"), "minusVotes": [cand(3, "Ben")] },
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["name"], "MinusRequiresTwoPlus");
        assert_eq!(body["code"], 6004);

        let req = actix_test::TestRequest::post()
            .uri("/api/vote?pollId=2")
            .set_json(json!({
                "account": &voter,
                "data": { "plusVotes": cand(2, "Balanced Approach") },
            }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mode"], "simulated");
        assert!(body.get("transaction").is_none());
    }

    #[actix_web::test]
    async fn test_malformed_bodies() {
        let app = app!(Pubkey::new_unique());

        let req = actix_test::TestRequest::post()
            .uri("/api/vote?pollId=3")
            .insert_header(ContentType::json())
            .set_payload("{\"voterIdentity\": ")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["name"], "MalformedRequest");
        assert_eq!(body["code"], 7010);

        // valid JSON matching neither body shape
        let req = actix_test::TestRequest::post()
            .uri("/api/vote/close?pollId=3")
            .set_json(json!({ "voter": "V" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["name"], "MalformedRequest");
        assert!(body["error"].as_str().is_some_and(|e| e.contains("account")));
    }

    #[actix_web::test]
    async fn test_close_and_debug() {
        let app = app!(Pubkey::new_unique());

        let req = actix_test::TestRequest::post()
            .uri("/api/vote/close?pollId=3")
            .set_json(json!({ "account": Pubkey::new_unique().to_string() }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Closing voter record for poll 3");

        let req = actix_test::TestRequest::get()
            .uri("/api/vote/debug-poll?pollId=3")
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pollExists"], true);
        assert_eq!(body["poll"]["candidateCount"], 4);
        assert_eq!(body["candidates"].as_array().unwrap().len(), 4);
    }
}
