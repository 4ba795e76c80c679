// Conversation orchestrator
// Date-picker gate, model context assembly and tool dispatch for one chat exchange

use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::hotel_data::Provenance;
use crate::inventory::{HotelInfo, InventoryEngine, InventoryError, StayDates};
use crate::llm::{
    FunctionCall, FunctionDeclaration, FunctionResponse, ModelClient, ModelError, ModelRequest,
    ModelRole, ModelTurn,
};

pub const DATE_PICKER_PROMPT: &str = "I'd be happy to help you with a booking! Please choose your check-in and check-out dates and a room type below.";

pub const NO_REPLY_FALLBACK: &str = "Sorry, I could not generate a response.";

pub const CHECK_AVAILABILITY_TOOL: &str = "check_room_availability";
pub const CALCULATE_PRICE_TOOL: &str = "calculate_room_price";

// Whole words and phrases that signal booking intent in a message without dates
const BOOKING_KEYWORDS: [&str; 12] = [
    "available",
    "availability",
    "vacancy",
    "book",
    "booking",
    "reserve",
    "reservation",
    "room price",
    "room rate",
    "rates for",
    "price for",
    "tariff",
];

const STALE_DATA_WARNING: &str = "IMPORTANT: You are currently using static/cached data. Inform the user that room availability and pricing information might not be up-to-date. Suggest they call the hotel directly to confirm current availability.";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Unsupported tool requested by model: {0}")]
    UnsupportedTool(String),
}

impl AssistantError {
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantError::Validation(_) => "ValidationError",
            AssistantError::Inventory(e) => e.kind(),
            AssistantError::ModelUnavailable(_) => "ModelUnavailable",
            AssistantError::UnsupportedTool(_) => "UnsupportedTool",
        }
    }
}

impl From<ModelError> for AssistantError {
    fn from(error: ModelError) -> Self {
        AssistantError::ModelUnavailable(error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl From<ConversationRole> for ModelRole {
    fn from(role: ConversationRole) -> Self {
        match role {
            ConversationRole::User => ModelRole::User,
            ConversationRole::Assistant => ModelRole::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    #[serde(rename = "content", alias = "text")]
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    pub reply_text: String,
    pub updated_history: Vec<ConversationTurn>,
    pub provenance: Provenance,
    pub show_date_picker: bool,
}

fn iso_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").ok())
        .as_ref()
}

fn booking_intent_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let alternatives = BOOKING_KEYWORDS
                .iter()
                .map(|keyword| regex::escape(keyword))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).ok()
        })
        .as_ref()
}

pub fn count_iso_dates(message: &str) -> usize {
    iso_date_pattern().map_or(0, |re| re.find_iter(message).count())
}

// True when the message shows booking intent but does not carry a date range yet
pub fn needs_date_picker(message: &str) -> bool {
    if count_iso_dates(message) >= 2 {
        return false;
    }
    booking_intent_pattern().map_or(false, |re| re.is_match(message))
}

pub fn system_context(info: &HotelInfo) -> String {
    let rooms = info
        .rooms
        .iter()
        .map(|room| {
            format!(
                "- {}: {} ({} {}/night base price)",
                room.name, room.description, room.currency, room.price
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut text = format!(
        "You are a helpful booking assistant for {name}.\n\
         Hotel Details:\n\
         - Name: {name}\n\
         - Address: {address}\n\
         - Phone: {phone}\n\
         - Check-in: {check_in}, Check-out: {check_out}\n\
         Available Rooms:\n\
         {rooms}\n\
         Help users check room availability and calculate total prices including GST and service charges. \
         Always ask for check-in date, check-out date, and room type before checking availability or calculating prices. \
         Use YYYY-MM-DD format for dates.",
        name = info.name,
        address = info.address,
        phone = info.phone,
        check_in = info.check_in_time,
        check_out = info.check_out_time,
        rooms = rooms,
    );

    if !info.data_source.is_live() {
        text.push_str("\n\n");
        text.push_str(STALE_DATA_WARNING);
    }
    text
}

pub fn acknowledgement(info: &HotelInfo) -> String {
    if info.data_source.is_live() {
        format!(
            "Understood. I will help guests book rooms at {}, check availability, and provide accurate pricing with all taxes included.",
            info.name
        )
    } else {
        format!(
            "Understood. I will help guests book rooms at {}. Note: I'm currently using cached data, so I'll inform guests that availability and pricing might not be current and suggest they contact the hotel directly at {} to confirm.",
            info.name, info.phone
        )
    }
}

// Hotel facts, the acknowledgement, prior turns in order, then the new message
pub fn build_contents(info: &HotelInfo, history: &[ConversationTurn], message: &str) -> Vec<ModelTurn> {
    let mut contents = Vec::with_capacity(history.len() + 3);
    contents.push(ModelTurn::user(system_context(info)));
    contents.push(ModelTurn::model(acknowledgement(info)));
    contents.extend(
        history
            .iter()
            .map(|turn| ModelTurn::text(turn.role.into(), turn.text.clone())),
    );
    contents.push(ModelTurn::user(message));
    contents
}

fn stay_parameters(action: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "checkIn": {
                "type": "string",
                "description": format!("Check-in date in YYYY-MM-DD format for the {action}")
            },
            "checkOut": {
                "type": "string",
                "description": format!("Check-out date in YYYY-MM-DD format for the {action}")
            },
            "roomType": {
                "type": "string",
                "description": "Room type, e.g. executive view, family non-view or junior suite"
            }
        },
        "required": ["checkIn", "checkOut", "roomType"]
    })
}

pub fn tool_declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: CHECK_AVAILABILITY_TOOL.to_string(),
            description: "Check if hotel rooms are available between check-in and check-out dates"
                .to_string(),
            parameters: stay_parameters("availability check"),
        },
        FunctionDeclaration {
            name: CALCULATE_PRICE_TOOL.to_string(),
            description: "Calculate total price for room booking based on dates and room type"
                .to_string(),
            parameters: stay_parameters("price calculation"),
        },
    ]
}

// Arguments shared by both tools
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StayRequest {
    pub check_in: String,
    pub check_out: String,
    pub room_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    CheckAvailability(StayRequest),
    CalculatePrice(StayRequest),
}

impl ToolInvocation {
    pub fn from_call(call: &FunctionCall) -> Result<Self, AssistantError> {
        // Unusable arguments become empty fields so the date check reports them
        let request = || serde_json::from_value::<StayRequest>(call.args.clone()).unwrap_or_default();

        match call.name.as_str() {
            CHECK_AVAILABILITY_TOOL => Ok(ToolInvocation::CheckAvailability(request())),
            CALCULATE_PRICE_TOOL => Ok(ToolInvocation::CalculatePrice(request())),
            other => Err(AssistantError::UnsupportedTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::CheckAvailability(_) => CHECK_AVAILABILITY_TOOL,
            ToolInvocation::CalculatePrice(_) => CALCULATE_PRICE_TOOL,
        }
    }

    fn request(&self) -> &StayRequest {
        match self {
            ToolInvocation::CheckAvailability(request) | ToolInvocation::CalculatePrice(request) => {
                request
            }
        }
    }

    // Runs the operation; bad dates are reported back to the model rather than failing the exchange
    pub async fn execute(&self, inventory: &InventoryEngine) -> Result<Value, AssistantError> {
        let request = self.request();
        let stay = match StayDates::parse(&request.check_in, &request.check_out) {
            Ok(stay) => stay,
            Err(e) => {
                warn!(tool = self.name(), error = %e, "Rejected tool arguments");
                return Ok(json!({ "error": e.to_string() }));
            }
        };

        let result = match self {
            ToolInvocation::CheckAvailability(request) => serde_json::to_value(
                inventory
                    .check_availability(&stay, &request.room_type)
                    .await?,
            ),
            ToolInvocation::CalculatePrice(request) => serde_json::to_value(
                inventory.calculate_price(&stay, &request.room_type).await?,
            ),
        };
        Ok(result.map_err(InventoryError::from)?)
    }
}

pub struct ConversationOrchestrator {
    inventory: Arc<InventoryEngine>,
    model: Arc<dyn ModelClient>,
    tools: Vec<FunctionDeclaration>,
}

impl ConversationOrchestrator {
    pub fn new(inventory: Arc<InventoryEngine>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            inventory,
            model,
            tools: tool_declarations(),
        }
    }

    pub fn inventory(&self) -> &Arc<InventoryEngine> {
        &self.inventory
    }

    #[instrument(skip(self, message, history), fields(history_len = history.len()))]
    pub async fn exchange(
        &self,
        message: &str,
        history: Vec<ConversationTurn>,
    ) -> Result<ExchangeOutcome, AssistantError> {
        if message.trim().is_empty() {
            return Err(AssistantError::Validation("Message is required".to_string()));
        }

        if needs_date_picker(message) {
            debug!("Booking intent without dates, asking for the date picker");
            let provenance = self.inventory.provenance().await?;
            return Ok(Self::finish(
                history,
                message,
                DATE_PICKER_PROMPT.to_string(),
                provenance,
                true,
            ));
        }

        let info = self.inventory.hotel_info().await?;
        let provenance = info.data_source;
        let mut request = ModelRequest {
            contents: build_contents(&info, &history, message),
            tools: self.tools.clone(),
        };

        let response = self.model.generate(&request).await?;

        let final_response = if response.has_function_calls() {
            let invocations = response
                .function_calls
                .iter()
                .map(ToolInvocation::from_call)
                .collect::<Result<Vec<_>, _>>()?;
            info!(
                tools = ?invocations.iter().map(ToolInvocation::name).collect::<Vec<_>>(),
                "Dispatching tool calls"
            );

            let results = join_all(
                invocations
                    .iter()
                    .map(|invocation| invocation.execute(&self.inventory)),
            )
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

            let responses = invocations
                .iter()
                .zip(results)
                .map(|(invocation, response)| FunctionResponse {
                    name: invocation.name().to_string(),
                    response,
                })
                .collect();

            request
                .contents
                .push(ModelTurn::function_calls(&response.function_calls));
            request
                .contents
                .push(ModelTurn::function_responses(responses));

            let follow_up = self.model.generate(&request).await?;
            if follow_up.has_function_calls() {
                warn!(
                    calls = follow_up.function_calls.len(),
                    "Ignoring tool calls requested in the follow-up round"
                );
            }
            follow_up
        } else {
            response
        };

        let reply = final_response
            .text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_REPLY_FALLBACK.to_string());

        Ok(Self::finish(history, message, reply, provenance, false))
    }

    fn finish(
        mut history: Vec<ConversationTurn>,
        message: &str,
        reply: String,
        provenance: Provenance,
        show_date_picker: bool,
    ) -> ExchangeOutcome {
        history.push(ConversationTurn::user(message));
        history.push(ConversationTurn::assistant(reply.clone()));
        ExchangeOutcome {
            reply_text: reply,
            updated_history: history,
            provenance,
            show_date_picker,
        }
    }
}
