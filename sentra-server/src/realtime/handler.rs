use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sentra_core::cache::CacheKeys;
use sentra_core::database::EmergencyStore;
use sentra_core::dispatch;
use sentra_core::events::{EventSink, ServerEvent};
use sentra_core::model::{
    ArmState, EmergencyInput, HeartbeatMarker, LOW_BATTERY_THRESHOLD, emergency_type_for_sensor,
    severity_for_sensor,
};

use crate::auth::authenticate_token;
use crate::infra::{app_state::AppState, errors::AppError};

use super::arming::ArmTicket;
use super::connection::{ClientConnection, Identity};
use super::messages::ClientEvent;

/// Outbound events buffered per connection before delivery drops.
const EVENT_BUFFER: usize = 256;

/// Upper bound on any single cache round-trip in the event loop. A
/// hung Redis must never stall a customer's socket.
const CACHE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

async fn bounded<T>(fut: impl Future<Output = sentra_core::Result<T>>) -> sentra_core::Result<T> {
    tokio::time::timeout(CACHE_CALL_TIMEOUT, fut).await?
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Authenticate the upgrade request, then hand the socket off.
/// Browsers cannot set headers on WebSocket upgrades, so the access
/// token arrives as a query parameter.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let Some(token) = query.token else {
        return AppError::unauthorized("Access token required").into_response();
    };

    let session = match authenticate_token(&state, &token).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    let identity = if session.is_operator() {
        Identity::Operator(session.claims.sub)
    } else {
        Identity::Customer(session.claims.sub)
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER);

    let connection = Arc::new(ClientConnection::new(identity, tx));
    let conn_id = connection.id;
    state.registry.register(Arc::clone(&connection));

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(connection_id = %conn_id, error = %e, "event serialization failed");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let (customer_id, operator_id) = match identity {
        Identity::Customer(id) => (Some(id), None),
        Identity::Operator(id) => (None, Some(id)),
    };
    connection.deliver(ServerEvent::ConnectionEstablished {
        customer_id,
        operator_id,
        timestamp: chrono::Utc::now(),
        message: "Connected to emergency dispatch".to_string(),
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => {
                    if let Err(e) = handle_client_event(&state, &connection, event).await {
                        error!(connection_id = %conn_id, error = %e, "client event failed");
                        connection.deliver(ServerEvent::Error {
                            message: "Failed to process event".to_string(),
                        });
                    }
                }
                Err(e) => {
                    debug!(connection_id = %conn_id, error = %e, "unparseable client event");
                    connection.deliver(ServerEvent::Error {
                        message: "Unrecognized event".to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id = %conn_id, error = %e, "websocket error");
                break;
            }
        }
    }

    state.registry.unregister(conn_id);
    info!(connection_id = %conn_id, ?identity, "client disconnected");
}

async fn handle_client_event(
    state: &AppState,
    connection: &Arc<ClientConnection>,
    event: ClientEvent,
) -> anyhow::Result<()> {
    // Every inbound event is customer-scoped; operator consoles only
    // receive.
    let Some(customer_id) = connection.identity.customer_id() else {
        connection.deliver(ServerEvent::Error {
            message: "This event requires a customer session".to_string(),
        });
        return Ok(());
    };

    match event {
        ClientEvent::CustomerStatusUpdate { status } => {
            bounded(state.cache.set(
                &CacheKeys::customer_status(customer_id),
                &json!({ "status": status, "last_activity": chrono::Utc::now() }),
                Some(Duration::from_secs(300)),
            ))
            .await?;

            connection.deliver(ServerEvent::CustomerStatusUpdated {
                status,
                timestamp: chrono::Utc::now(),
            });
        }

        ClientEvent::RequestSystemStatus => {
            let arm_state: Option<ArmState> =
                bounded(state.cache.get(&CacheKeys::system_armed(customer_id))).await?;
            let system_status = match arm_state {
                Some(state) => serde_json::to_value(state)?,
                None => json!({ "status": "disarmed" }),
            };

            let devices = state.devices.list_for_customer(customer_id).await?;

            connection.deliver(ServerEvent::SystemStatusResponse {
                system_status,
                devices,
                timestamp: chrono::Utc::now(),
            });
        }

        ClientEvent::DeviceSensorTrigger {
            device_id,
            sensor_type,
            trigger_data,
        } => {
            let Some(device) = state.devices.get_owned(device_id, customer_id).await? else {
                connection.deliver(ServerEvent::Error {
                    message: "Device not found".to_string(),
                });
                return Ok(());
            };

            state.devices.touch_heartbeat(device_id).await?;

            // A sensor trip only escalates while the system is armed;
            // otherwise it is just activity.
            let armed: Option<ArmState> =
                bounded(state.cache.get(&CacheKeys::system_armed(customer_id))).await?;
            let input = EmergencyInput {
                customer_id,
                device_id: Some(device_id),
                severity: severity_for_sensor(&sensor_type),
                kind: emergency_type_for_sensor(&sensor_type),
                description: Some(format!(
                    "{} sensor triggered on {} device",
                    sensor_type, device.kind
                )),
                location_data: trigger_data.clone(),
            };
            dispatch::escalate_if_armed(&state.dispatch_ctx(), armed.is_some(), input).await?;

            state.registry.notify_customer(
                customer_id,
                ServerEvent::SensorTriggered {
                    device_id,
                    device_type: device.kind,
                    location: device.location,
                    sensor_type,
                    trigger_data,
                    timestamp: chrono::Utc::now(),
                },
            );
        }

        ClientEvent::DeviceHeartbeat {
            device_id,
            status,
            battery_level,
        } => {
            let Some(device) = state
                .devices
                .record_heartbeat(device_id, customer_id, status.as_deref(), battery_level)
                .await?
            else {
                connection.deliver(ServerEvent::Error {
                    message: "Device not found".to_string(),
                });
                return Ok(());
            };

            let marker = HeartbeatMarker {
                timestamp: chrono::Utc::now(),
                status: device.status.clone().unwrap_or_else(|| "online".to_string()),
                battery_level: device.battery_level,
            };
            bounded(state.cache.set(
                &CacheKeys::device_heartbeat(device_id),
                &marker,
                Some(Duration::from_secs(HeartbeatMarker::TTL_SECONDS)),
            ))
            .await?;

            state.registry.notify_customer(
                customer_id,
                ServerEvent::HeartbeatReceived {
                    device_id,
                    status: device.status.clone(),
                    battery_level: device.battery_level,
                    timestamp: chrono::Utc::now(),
                },
            );
            connection.deliver(ServerEvent::HeartbeatAcknowledged {
                device_id,
                timestamp: chrono::Utc::now(),
            });

            if let Some(level) = device.battery_level
                && level <= LOW_BATTERY_THRESHOLD
            {
                warn!(%device_id, battery_level = level, "device battery low");
                state.registry.notify_customer(
                    customer_id,
                    ServerEvent::BatteryLow {
                        device_id,
                        battery_level: level,
                        device_type: Some(device.kind),
                        location: device.location,
                        timestamp: chrono::Utc::now(),
                    },
                );
            }
        }

        ClientEvent::EmergencyUpdate {
            emergency_id,
            status,
            notes,
        } => {
            let owned = state
                .emergencies
                .get(emergency_id)
                .await?
                .is_some_and(|e| e.customer_id == customer_id);
            if !owned {
                connection.deliver(ServerEvent::Error {
                    message: "Emergency not found".to_string(),
                });
                return Ok(());
            }

            state
                .emergencies
                .append_response(
                    emergency_id,
                    None,
                    &format!("customer_{status}"),
                    None,
                    notes.as_deref().unwrap_or(""),
                )
                .await?;

            state.registry.notify_customer(
                customer_id,
                ServerEvent::EmergencyUpdated {
                    emergency_id,
                    status: status.clone(),
                    timestamp: chrono::Utc::now(),
                },
            );
            state
                .registry
                .notify_operators(ServerEvent::EmergencyCustomerUpdate {
                    emergency_id,
                    customer_id,
                    status,
                    notes,
                    timestamp: chrono::Utc::now(),
                });
        }

        ClientEvent::SystemArmRequest { mode, delay } => {
            info!(%customer_id, %mode, delay, "arm countdown requested");
            connection.deliver(ServerEvent::SystemArmCountdown {
                mode: mode.clone(),
                delay,
                timestamp: chrono::Utc::now(),
            });

            let cache = state.cache.clone();
            let registry = Arc::clone(&state.registry);
            state.arm_scheduler.schedule(
                customer_id,
                Duration::from_secs(delay),
                move |ticket: ArmTicket| async move {
                    let arm_state = ArmState::armed(mode.clone(), customer_id);
                    let write = bounded(cache.set(
                        &CacheKeys::system_armed(customer_id),
                        &arm_state,
                        Some(Duration::from_secs(ArmState::TTL_SECONDS)),
                    ))
                    .await;

                    match write {
                        // The commit decides whether the write stands;
                        // a disarm that landed after the deadline
                        // invalidates it and the key is removed again.
                        Ok(()) => {
                            if ticket.commit() {
                                info!(%customer_id, %mode, "system armed");
                                registry.notify_customer(
                                    customer_id,
                                    ServerEvent::SystemArmed {
                                        mode,
                                        timestamp: arm_state.timestamp,
                                    },
                                );
                            } else {
                                debug!(%customer_id, "arm activation superseded by disarm");
                                if let Err(e) = bounded(
                                    cache.delete(&CacheKeys::system_armed(customer_id)),
                                )
                                .await
                                {
                                    error!(%customer_id, error = %e, "superseded arm write not rolled back");
                                }
                            }
                        }
                        Err(e) => {
                            // Nothing was written; consume the entry so
                            // the failed countdown is no longer pending.
                            let _ = ticket.commit();
                            error!(%customer_id, error = %e, "arm activation failed");
                        }
                    }
                },
            );
        }

        ClientEvent::SystemDisarmRequest => {
            let cancelled = state.arm_scheduler.cancel(customer_id);
            if cancelled {
                debug!(%customer_id, "pending arm countdown cancelled");
            }

            bounded(state.cache.delete(&CacheKeys::system_armed(customer_id))).await?;

            info!(%customer_id, "system disarmed");
            state.registry.notify_customer(
                customer_id,
                ServerEvent::SystemDisarmed {
                    timestamp: chrono::Utc::now(),
                },
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sentra_core::SentraError;

    #[tokio::test(start_paused = true)]
    async fn cache_calls_are_time_bounded() {
        let result = bounded(std::future::pending::<sentra_core::Result<()>>()).await;
        assert!(matches!(result, Err(SentraError::Downstream(_))));
    }
}
