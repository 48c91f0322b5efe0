use clap::Parser;
use futures::{SinkExt, StreamExt};
use shared::{decode_binary, decode_text, encode_text, ClientEvent, RoomCode, ServerEvent};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Scripted client that walks a room through create, ready, start and one turn
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Websocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:4000")]
    url: String,
    /// Join this room instead of creating one
    #[clap(short, long)]
    room: Option<String>,
    /// Display name
    #[clap(short, long, default_value = "tester")]
    name: String,
    /// Seconds to keep printing events after the script finishes
    #[clap(short, long, default_value = "2")]
    linger: u64,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn send(ws: &mut WsStream, event: &ClientEvent) -> Result<(), Box<dyn std::error::Error>> {
    println!("-> {:?}", event);
    ws.send(Message::Text(encode_text(event)?)).await?;
    Ok(())
}

/// Prints events until one matches `done` or `wait` elapses.
async fn read_until<F>(
    ws: &mut WsStream,
    wait: Duration,
    mut done: F,
) -> Result<Option<ServerEvent>, Box<dyn std::error::Error>>
where
    F: FnMut(&ServerEvent) -> bool,
{
    loop {
        let frame = match timeout(wait, ws.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) | Err(_) => return Ok(None),
        };
        let event: ServerEvent = match frame {
            Message::Text(text) => decode_text(&text)?,
            Message::Binary(data) => decode_binary(&data)?,
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        println!("<- {:?}", event);
        if let ServerEvent::Error { .. } = event {
            return Ok(Some(event));
        }
        if done(&event) {
            return Ok(Some(event));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let wait = Duration::from_secs(5);

    println!("Connecting to {}", args.url);
    let (mut ws, _) = connect_async(args.url.as_str()).await?;

    let room_code = match &args.room {
        Some(code) => {
            let room_code = RoomCode::parse(code)?;
            send(
                &mut ws,
                &ClientEvent::JoinGame {
                    room_code: room_code.clone(),
                    player_name: args.name.clone(),
                },
            )
            .await?;
            read_until(&mut ws, wait, |e| matches!(e, ServerEvent::JoinedGame { .. })).await?;
            room_code
        }
        None => {
            send(
                &mut ws,
                &ClientEvent::CreateGame {
                    player_name: args.name.clone(),
                },
            )
            .await?;
            match read_until(&mut ws, wait, |e| matches!(e, ServerEvent::GameCreated { .. }))
                .await?
            {
                Some(ServerEvent::GameCreated { room_code }) => room_code,
                other => {
                    println!("Expected gameCreated but got: {:?}", other);
                    return Ok(());
                }
            }
        }
    };
    println!("Using room {}", room_code);

    send(
        &mut ws,
        &ClientEvent::PlayerReady {
            room_code: room_code.clone(),
        },
    )
    .await?;
    read_until(&mut ws, wait, |e| matches!(e, ServerEvent::PlayerList { .. })).await?;

    send(
        &mut ws,
        &ClientEvent::GameStart {
            room_code: room_code.clone(),
        },
    )
    .await?;
    if let Some(ServerEvent::GameStart { board, ports, .. }) =
        read_until(&mut ws, wait, |e| matches!(e, ServerEvent::GameStart { .. })).await?
    {
        for tile in &board {
            println!(
                "  tile {:>2}: {:?} roll={:?} at ({:.1}, {:.1})",
                tile.id, tile.material, tile.roll_number, tile.x, tile.y
            );
        }
        println!("  {} harbors", ports.len());
    }

    sleep(Duration::from_millis(200)).await;
    send(
        &mut ws,
        &ClientEvent::EndTurn {
            room_code: room_code.clone(),
        },
    )
    .await?;
    read_until(&mut ws, wait, |e| matches!(e, ServerEvent::TurnChanged { .. })).await?;

    read_until(&mut ws, Duration::from_secs(args.linger), |_| false).await?;

    ws.close(None).await?;
    println!("Test client finished");
    Ok(())
}
