use chat_widget::{widget, ChatWidget, Config, HttpCompletionClient};
use chat_widget::upload::Uploader;
use iced::{
    widget::{column, container, stack, text},
    window, Element, Length, Size, Subscription, Task, Theme,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let client = HttpCompletionClient::new(config.completion.clone())?;
    if config.completion.endpoint.is_empty() {
        tracing::warn!("no completion endpoint configured; set CHAT_WIDGET_API_URL");
    }
    tracing::info!(model = client.model(), "starting chat widget demo");

    let window_size = Size::new(config.window.width as f32, config.window.height as f32);

    iced::application("My Application", Host::update, Host::view)
        .theme(Host::theme)
        .subscription(Host::subscription)
        .window(window::Settings {
            size: window_size,
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(move || Host::new(&config, client))?;

    Ok(())
}

#[derive(Debug, Clone)]
enum Message {
    Widget(widget::Message),
}

/// Sample page that mounts the widget on top of its own content.
struct Host {
    widget: ChatWidget,
}

impl Host {
    fn new(config: &Config, client: HttpCompletionClient) -> (Self, Task<Message>) {
        let uploader = Uploader::new(config.upload.endpoint.clone());
        let widget = ChatWidget::new(config, Arc::new(client), uploader);
        (Host { widget }, Task::none())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Widget(message) => self.widget.update(message).map(Message::Widget),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        self.widget.subscription().map(Message::Widget)
    }

    fn view(&self) -> Element<Message> {
        let page = container(
            column![
                text("My Application").size(32),
                text("This is a sample application with a chat widget. Drag the launcher anywhere; click it to chat.")
                    .size(16),
            ]
            .spacing(12),
        )
        .padding(32)
        .width(Length::Fill)
        .height(Length::Fill);

        stack![page, self.widget.view().map(Message::Widget)]
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
