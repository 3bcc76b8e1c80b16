//! Headless demo shell: seeds the in-memory store and drives the pagination
//! controller and mutation engine end to end, printing what a UI would show.

mod config;
mod logging;
mod state;

use std::{process, sync::Arc, time::Duration};

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use feed_core::{FeedUpdate, Room, ScrollInstruction, StoreError, Viewport};
use feed_room::{MutationEngine, PaginationController};
use feed_store::InMemoryStore;

use crate::{
    config::ShellConfig,
    state::{NoticeLevel, RoomViewState},
};

const DEMO_ROOM: &str = "rust-lounge";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match ShellConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };
    info!(
        user = %config.current_user,
        page_size = config.page_size,
        "starting roomfeed shell"
    );

    let store = Arc::new(InMemoryStore::new());
    if let Err(err) = seed_demo_room(&store, &config.current_user) {
        eprintln!("Failed seeding demo data: {err}");
        process::exit(1);
    }

    let controller = PaginationController::new(store.clone(), config.page_size);
    let engine = MutationEngine::new(store.clone(), config.current_user.clone());
    let mut updates = controller.updates();
    let mut view = RoomViewState::new(DEMO_ROOM, config.bottom_threshold_pct);

    if let Err(err) = controller.open(DEMO_ROOM).await {
        eprintln!("Failed opening the room feed: {err}");
        process::exit(1);
    }
    let mut window = next_update(&mut updates).await;
    let instruction = view.apply_update(window.clone());
    render(&view, instruction);

    if window.can_load_more {
        println!("-- load more --");
        // Pretend the user is reading at the top of a measured list.
        view.set_viewport(Viewport {
            scroll_top: 0.0,
            scroll_height: 1200.0,
            client_height: 600.0,
        });
        let anchor = view.capture_load_more_anchor();
        if let Err(err) = controller.load_more().await {
            eprintln!("Failed growing the window: {err}");
            process::exit(1);
        }
        window = next_update(&mut updates).await;
        let instruction = view.apply_update(window.clone());

        // No content-measured signal here, so wait out the settle delay
        // before applying the corrective offset.
        tokio::time::sleep(Duration::from_millis(config.settle_delay_ms)).await;
        if let Some(anchor) = anchor {
            let grown_height = 1200.0 + 60.0 * (window.messages.len() as f64);
            println!("[scroll corrected to {}]", anchor.corrected_offset(grown_height));
        }
        render(&view, instruction);
    }

    // Exercise the mutation engine the way message item actions would.
    if let Some(target) = window.messages.last().cloned() {
        match engine.toggle_like(&target.id).await {
            Ok(outcome) => view.notice_like(outcome),
            Err(err) => view.notice_store_error(&err),
        }
        // The like lands in the subscribed window, so a fresh update follows.
        window = next_update(&mut updates).await;
        view.apply_update(window.clone());

        match engine.toggle_admin(DEMO_ROOM, &target.record.author).await {
            Ok(outcome) => view.notice_admin(outcome),
            Err(err) => view.notice_store_error(&err),
        }

        match engine
            .delete_message(
                DEMO_ROOM,
                &window.messages,
                &target.id,
                target.record.file.as_ref(),
                true,
            )
            .await
        {
            Ok(outcome) => view.notice_delete(&outcome),
            Err(err) => view.notice_store_error(&err),
        }
        let update = next_update(&mut updates).await;
        let instruction = view.apply_update(update);
        render(&view, instruction);
    }
    print_notices(&mut view);

    match store.read_value(&format!("/rooms/{DEMO_ROOM}/lastMessage")) {
        Ok(Some(last)) => println!("room lastMessage now points at {}", last["msgId"]),
        Ok(None) => println!("room lastMessage is absent"),
        Err(err) => eprintln!("Failed reading lastMessage: {err}"),
    }

    controller.close().await;
}

async fn next_update(updates: &mut feed_room::FeedUpdateStream) -> FeedUpdate {
    match updates.recv().await {
        Ok(update) => update,
        Err(_) => {
            eprintln!("Feed update stream closed unexpectedly");
            process::exit(1);
        }
    }
}

fn render(view: &RoomViewState, instruction: ScrollInstruction) {
    let snapshot = view.snapshot();
    if snapshot.is_empty {
        println!("No messages yet");
        return;
    }

    for group in &snapshot.groups {
        println!("== {} ==", group.date);
        for message in &group.messages {
            let body = message.record.body.as_deref().unwrap_or("<attachment>");
            println!("  {}: {}", message.record.author, body);
        }
    }
    println!(
        "[can_load_more={} scroll={instruction:?}]",
        snapshot.can_load_more
    );
}

fn print_notices(view: &mut RoomViewState) {
    for notice in view.drain_notices() {
        match notice.level {
            NoticeLevel::Info => println!("(i) {}", notice.text),
            NoticeLevel::Error => println!("(!) {}", notice.text),
        }
    }
}

fn seed_demo_room(store: &InMemoryStore, current_user: &str) -> Result<(), StoreError> {
    let mut room = Room::default();
    room.admins.insert(current_user.to_owned(), true);
    let room_value =
        serde_json::to_value(&room).map_err(|err| StoreError::Backend(err.to_string()))?;
    store.seed(&format!("/rooms/{DEMO_ROOM}"), room_value)?;

    let now = Utc::now().timestamp_millis();
    let authors = ["uid-ferris", "uid-ada", current_user];
    for index in 0..20_i64 {
        let id = Uuid::new_v4();
        // Spread the history over yesterday and today.
        let created_at = now - DAY_MS - 3_600_000 + index * 2 * 3_600_000 / 3;
        let author = authors[(index as usize) % authors.len()];
        store.seed(
            &format!("/messages/{id}"),
            json!({
                "roomId": DEMO_ROOM,
                "createdAt": created_at,
                "author": author,
                "body": format!("demo message {index}"),
            }),
        )?;
    }

    let attachment_url = "https://files.example.org/demo/photo.png";
    store.put_external_object(attachment_url)?;
    store.seed(
        &format!("/messages/{}", Uuid::new_v4()),
        json!({
            "roomId": DEMO_ROOM,
            "createdAt": now,
            "author": current_user,
            "file": {
                "name": "photo.png",
                "url": attachment_url,
                "inline": false,
            },
        }),
    )?;

    Ok(())
}
