use std::{fs, sync::Arc};
use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::Config,
    handlers::{callbacks::handle_callback_query, commands::Command, handle_message, App},
    store,
};

/// # Panics
///
/// Panics if there's no key file, the configuration is incomplete,
/// or the record store can't be opened.
pub async fn entry() {
    log::info!("ASYNC WOOOO");
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let config = Config::from_env().expect("Invalid configuration!");

    let store = store::open(&config.storage)
        .await
        .expect("Could not open the record store!");

    let bot = Bot::new(key.trim());

    bot.set_my_commands(Command::generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let app = Arc::new(App::new(config, store));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
