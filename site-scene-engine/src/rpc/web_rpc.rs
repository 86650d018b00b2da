use crate::engine::assets::catalog::TypeCatalog;
use crate::engine::assets::design::SiteDesign;
use crate::engine::assets::placement::PlacementObject;
use crate::engine::config::EngineConfig;
use crate::engine::core::events::*;
use crate::engine::core::plugin::SceneSyncSet;
use crate::projection::GeoPoint;
use crate::tools::interaction::state::PatchOutbox;
use crate::tools::measure::MeasureTool;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
#[cfg(not(target_arch = "wasm32"))]
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification for one-way engine to host messages.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[cfg(not(target_arch = "wasm32"))]
pub const SENT_LOG_CAPACITY: usize = 256;

/// Outgoing messages for the host page.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
    /// Native builds have no parent window; the latest `SENT_LOG_CAPACITY`
    /// sent messages are kept here.
    #[cfg(not(target_arch = "wasm32"))]
    sent: VecDeque<String>,
}

impl WebRpcInterface {
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn take_sent(&mut self) -> Vec<String> {
        self.sent.drain(..).collect()
    }
}

/// Raw messages received from the host, filled by the `message` listener on
/// wasm or pushed directly by native hosts.
#[derive(Resource, Clone, Default)]
pub struct MessageQueue(Arc<Mutex<Vec<String>>>);

impl MessageQueue {
    pub fn push(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(message.into());
        }
    }

    fn take(&self) -> Vec<String> {
        self.0
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

/// JSON-RPC bridge between the host page and the engine.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .init_resource::<MessageQueue>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (process_incoming_messages, handle_rpc_messages)
                    .chain()
                    .before(SceneSyncSet),
            )
            .add_systems(
                Update,
                (forward_engine_notifications, send_outgoing_messages)
                    .chain()
                    .after(SceneSyncSet),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(queue: Res<MessageQueue>) {
    let queue = queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message: String = data.into();
            if message.contains("jsonrpc") {
                queue.push(message);
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    match window() {
        Some(window) => {
            if let Err(err) =
                window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            {
                error!("Failed to register message listener: {:?}", err);
            }
        }
        None => error!("Window object not available"),
    }

    // Ownership moves to JS.
    closure.forget();
}

fn process_incoming_messages(
    queue: Res<MessageQueue>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    for content in queue.take() {
        message_events.write(IncomingRpcMessage { content });
    }
}

/// Everything an RPC method may touch.
#[derive(SystemParam)]
struct EngineInputs<'w> {
    site: EventWriter<'w, SiteBoundaryEvent>,
    objects: EventWriter<'w, UpsertObjectsEvent>,
    clicks: EventWriter<'w, PointerClickEvent>,
    clear: EventWriter<'w, ClearSelectionEvent>,
    drags: EventWriter<'w, DragEvent>,
    rotations: EventWriter<'w, RotateSelectedEvent>,
    measurement: EventWriter<'w, SetGeoMeasurementEvent>,
    frames: EventWriter<'w, RenderFrameEvent>,
    camera_moves: EventWriter<'w, CameraMovedEvent>,
    designs: EventWriter<'w, LoadDesignEvent>,
    dispose: EventWriter<'w, DisposeEvent>,
    catalog: ResMut<'w, TypeCatalog>,
    measure_tool: ResMut<'w, MeasureTool>,
    config: Res<'w, EngineConfig>,
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut inputs: EngineInputs,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) if request.jsonrpc == "2.0" => {
                debug!("Processing RPC method: {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut inputs) {
                    rpc_interface.queue_response(response);
                }
            }
            Ok(request) => {
                warn!("Rejected RPC with version {:?}", request.jsonrpc);
                rpc_interface.queue_response(create_error_response(
                    request.id.unwrap_or(serde_json::Value::Null),
                    -32600,
                    "Invalid Request",
                    None,
                ));
            }
            Err(parse_error) => {
                warn!("Unparseable RPC message: {}", parse_error);
                rpc_interface.queue_response(create_error_response(
                    serde_json::Value::Null,
                    -32600,
                    "Invalid Request",
                    Some(serde_json::json!({ "reason": parse_error.to_string() })),
                ));
            }
        }
    }
}

/// Run one request. Requests without an id are notifications: they still
/// run but get no response.
fn handle_rpc_request(request: &RpcRequest, inputs: &mut EngineInputs) -> Option<RpcResponse> {
    let params = &request.params;
    let result = match request.method.as_str() {
        "set_site_boundary" => handle_set_site_boundary(params, inputs),
        "upsert_objects" => handle_upsert_objects(params, inputs),
        "set_catalog" => handle_set_catalog(params, inputs),
        "load_design" => handle_load_design(params, inputs),
        "pointer_click" => handle_pointer_click(params, inputs),
        "clear_selection" => {
            inputs.clear.write(ClearSelectionEvent);
            Ok(serde_json::json!({ "success": true }))
        }
        "begin_drag" => {
            inputs.drags.write(DragEvent::Begin);
            Ok(serde_json::json!({ "success": true }))
        }
        "drag_to_screen" => handle_drag_to_screen(params, inputs),
        "end_drag" => {
            inputs.drags.write(DragEvent::End);
            Ok(serde_json::json!({ "success": true }))
        }
        "rotate_selected" => handle_rotate_selected(params, inputs),
        "set_measurement_points" => handle_set_measurement_points(params, inputs),
        "render_frame" => handle_render_frame(params, inputs),
        "camera_moved" => {
            inputs.camera_moves.write(CameraMovedEvent);
            Ok(serde_json::json!({ "success": true }))
        }
        "get_map_style" => handle_get_map_style(params, inputs),
        "dispose" => {
            inputs.dispose.write(DisposeEvent);
            Ok(serde_json::json!({ "success": true }))
        }
        _ => Err(RpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": request.method })),
        }),
    };

    if let Err(error) = &result {
        warn!("RPC {} failed: {}", request.method, error.message);
    }

    let id = request.id.clone()?;
    Some(match result {
        Ok(value) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(value),
            error: None,
            id: Some(id),
        },
        Err(error) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        },
    })
}

fn parse_params<T: DeserializeOwned>(
    params: &serde_json::Value,
    expected: &str,
) -> Result<T, RpcError> {
    serde_json::from_value(params.clone())
        .map_err(|err| RpcError::invalid_params(&format!("Expected {expected}: {err}")))
}

fn handle_set_site_boundary(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        boundary: Option<Vec<GeoPoint>>,
    }
    let Params { boundary } = parse_params(params, "'boundary' ring or null")?;

    let vertices = boundary.as_ref().map_or(0, Vec::len);
    inputs.site.write(SiteBoundaryEvent(boundary));
    Ok(serde_json::json!({ "success": true, "vertices": vertices }))
}

fn handle_upsert_objects(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        objects: Vec<PlacementObject>,
    }
    let Params { objects } = parse_params(params, "'objects' array")?;

    let count = objects.len();
    inputs.objects.write(UpsertObjectsEvent(objects));
    Ok(serde_json::json!({ "success": true, "count": count }))
}

fn handle_set_catalog(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        catalog: TypeCatalog,
    }
    let Params { catalog } = parse_params(params, "'catalog' array")?;

    let count = catalog.len();
    *inputs.catalog = catalog;
    info!("Catalog replaced with {} entries", count);
    Ok(serde_json::json!({ "success": true, "count": count }))
}

fn handle_load_design(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    let design: SiteDesign = parse_params(params, "design document")?;
    design
        .validate()
        .map_err(|err| RpcError::invalid_params(&err.to_string()))?;
    let origin = design.resolved_origin();
    let count = design.objects.len();
    inputs.designs.write(LoadDesignEvent(design));
    Ok(serde_json::json!({ "success": true, "origin": origin, "objects": count }))
}

fn handle_pointer_click(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        x: f32,
        y: f32,
    }
    let Params { x, y } = parse_params(params, "'x' and 'y' screen coordinates")?;
    inputs.clicks.write(PointerClickEvent {
        screen: Vec2::new(x, y),
    });
    Ok(serde_json::json!({ "success": true }))
}

fn handle_drag_to_screen(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        x: f32,
        y: f32,
    }
    let Params { x, y } = parse_params(params, "'x' and 'y' screen coordinates")?;
    inputs.drags.write(DragEvent::ToScreen(Vec2::new(x, y)));
    Ok(serde_json::json!({ "success": true }))
}

fn handle_rotate_selected(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize, Default)]
    struct Params {
        delta: Option<f32>,
    }
    let Params { delta } = if params.is_null() {
        Params::default()
    } else {
        parse_params(params, "optional 'delta' in radians")?
    };

    let delta = delta.unwrap_or(inputs.config.rotation_step);
    inputs.rotations.write(RotateSelectedEvent { delta });
    Ok(serde_json::json!({ "success": true, "delta": delta }))
}

/// Geographic points in, overlay plus distance out. Only the last two points
/// count; an empty list leaves measure mode.
fn handle_set_measurement_points(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        points: Vec<GeoPoint>,
    }
    let Params { points } = parse_params(params, "'points' array of [lng, lat]")?;

    let tool = &mut inputs.measure_tool;
    tool.set_active(!points.is_empty());
    for point in points {
        tool.push(point);
    }
    inputs
        .measurement
        .write(SetGeoMeasurementEvent(tool.points()));

    let result = match &tool.current {
        Some(measurement) => serde_json::json!({
            "distance": measurement.distance,
            "midpoint": measurement.midpoint,
            "label": measurement.distance_label(),
        }),
        None => serde_json::Value::Null,
    };
    Ok(result)
}

fn handle_render_frame(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        matrix: Vec<f64>,
    }
    let Params { matrix } = parse_params(params, "'matrix' of 16 numbers")?;
    let matrix: [f64; 16] = matrix
        .try_into()
        .map_err(|m: Vec<f64>| RpcError::invalid_params(&format!("Expected 16 numbers, got {}", m.len())))?;

    inputs.frames.write(RenderFrameEvent { matrix });
    Ok(serde_json::json!({ "success": true }))
}

fn handle_get_map_style(
    params: &serde_json::Value,
    inputs: &mut EngineInputs,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize, Default)]
    struct Params {
        style: Option<String>,
    }
    let Params { style } = if params.is_null() {
        Params::default()
    } else {
        parse_params(params, "optional 'style' key")?
    };

    let map = &inputs.config.map;
    let key = style.unwrap_or_else(|| map.default_style.clone());
    let url = map
        .style_url(&key)
        .ok_or_else(|| RpcError::internal_error("No map styles configured"))?;
    Ok(serde_json::json!({
        "style": key,
        "url": url,
        "access_token": map.access_token,
        "center": map.default_center,
        "zoom": map.default_zoom,
        "pitch": map.pitch,
        "terrain": map.terrain_enabled,
        "terrain_exaggeration": map.terrain_exaggeration,
    }))
}

/// Turn engine output into host notifications.
fn forward_engine_notifications(
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut outbox: ResMut<PatchOutbox>,
    mut selections: EventReader<SelectionChangedEvent>,
    mut pan_locks: EventReader<PanLockEvent>,
) {
    for patch in outbox.drain() {
        match serde_json::to_value(&patch) {
            Ok(params) => rpc_interface.send_notification("object_update", params),
            Err(err) => error!("Failed to serialize patch for {}: {}", patch.id, err),
        }
    }
    for SelectionChangedEvent { selected } in selections.read() {
        rpc_interface.send_notification("selection_changed", serde_json::json!({ "id": selected }));
    }
    for PanLockEvent { locked } in pan_locks.read() {
        rpc_interface.send_notification("pan_lock", serde_json::json!({ "locked": locked }));
    }
}

/// Create standardized error response with optional data payload.
fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Notifications first, then responses.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    let notifications = std::mem::take(&mut rpc_interface.outgoing_notifications);
    let responses = std::mem::take(&mut rpc_interface.outgoing_responses);

    for notification in &notifications {
        send_message_to_parent(&mut rpc_interface, notification);
    }
    for response in &responses {
        send_message_to_parent(&mut rpc_interface, response);
    }
}

fn send_message_to_parent<T: Serialize>(rpc_interface: &mut WebRpcInterface, message: &T) {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            return;
        }
    };

    #[cfg(target_arch = "wasm32")]
    {
        let _ = rpc_interface;
        if let Some(window) = window() {
            if let Some(parent) = window.parent().ok().flatten() {
                if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                    error!("Failed to send message to parent: {:?}", e);
                }
            } else {
                warn!("No parent window available for message transmission");
            }
        } else {
            error!("Window object not available");
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        if rpc_interface.sent.len() == SENT_LOG_CAPACITY {
            rpc_interface.sent.pop_front();
        }
        rpc_interface.sent.push_back(json);
    }
}

impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}
