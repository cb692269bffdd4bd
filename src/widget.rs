//! The embeddable chat widget: launcher, panel, and the glue between them.
//!
//! Hosts embed it like any other iced component: forward `view`, `update`
//! and `subscription` through their own message type with `map`.

use iced::widget::{
    button, column, container, horizontal_space, mouse_area, row, scrollable, stack, text, text_input, Column, Row,
};
use iced::{
    alignment, event, keyboard, mouse, time, window, Border, Element, Event as IcedEvent, Length, Padding, Point,
    Size, Subscription, Task, Theme, Vector,
};
use std::sync::Arc;
use std::time::Duration;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::completion::{CompletionClient, CompletionError};
use crate::config::Config;
use crate::launcher::{Gesture, Launcher};
use crate::message::{Attachment, ChatMessage};
use crate::placement::{place_panel, Metrics};
use crate::store::{MessageStore, PendingTurn};
use crate::upload::Uploader;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CHIP_MAX_WIDTH: usize = 15;
const CHIP_KEEP_WIDTH: usize = 12;

#[derive(Debug, Clone)]
pub enum Message {
    /// Cursor position relative to the launcher's top-left.
    LauncherHovered(Point),
    LauncherPressed,
    /// Window-wide pointer events, only delivered while dragging.
    PointerMoved(Point),
    PointerReleased,
    PointerLeft,
    ViewportResized(Size),
    ClosePanel,
    ClearHistory,
    InputChanged(String),
    Submit,
    ReplyReceived(Result<String, CompletionError>),
    AttachRequested,
    FilesPicked(Vec<Attachment>),
    RemoveAttachment(usize),
    Tick,
}

pub struct ChatWidget {
    title: String,
    launcher: Launcher,
    store: MessageStore,
    panel_size: Size,
    metrics: Metrics,
    input: String,
    pending_attachments: Vec<Attachment>,
    in_flight: Option<PendingTurn>,
    hover_offset: Option<Vector>,
    last_pointer: Point,
    loading_frame: usize,
    client: Arc<dyn CompletionClient>,
    uploader: Uploader,
    input_id: text_input::Id,
    scroll_id: scrollable::Id,
}

impl ChatWidget {
    pub fn new(config: &Config, client: Arc<dyn CompletionClient>, uploader: Uploader) -> Self {
        let widget = &config.widget;
        let viewport = Size::new(config.window.width as f32, config.window.height as f32);
        let launcher = Launcher::new(
            Point::new(widget.initial_x, widget.initial_y),
            Size::new(widget.launcher_size, widget.launcher_size),
            viewport,
            widget.drag_threshold,
        );

        ChatWidget {
            title: widget.title.clone(),
            launcher,
            store: MessageStore::new(widget.greeting.clone()),
            panel_size: Size::new(widget.panel_width, widget.panel_height),
            metrics: Metrics {
                bottom_threshold: widget.bottom_threshold,
                gap: widget.gap,
                edge_inset: widget.edge_inset,
            },
            input: String::new(),
            pending_attachments: Vec::new(),
            in_flight: None,
            hover_offset: None,
            last_pointer: Point::ORIGIN,
            loading_frame: 0,
            client,
            uploader,
            input_id: text_input::Id::unique(),
            scroll_id: scrollable::Id::unique(),
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn pending_attachments(&self) -> &[Attachment] {
        &self.pending_attachments
    }

    fn can_send(&self) -> bool {
        !self.store.is_waiting_for_reply() && (!self.input.trim().is_empty() || !self.pending_attachments.is_empty())
    }

    /// Cursor offset inside the launcher, if the last known pointer is over it.
    fn pointer_over_launcher(&self) -> Option<Vector> {
        let offset = self.last_pointer - self.launcher.position();
        let size = self.launcher.size();
        let within = (0.0..=size.width).contains(&offset.x) && (0.0..=size.height).contains(&offset.y);
        within.then_some(offset)
    }

    /// The window-wide pointer listener lives exactly as long as the drag.
    fn listens_for_drag(&self) -> bool {
        self.launcher.is_dragging()
    }

    fn scroll_to_latest(&self) -> Task<Message> {
        scrollable::snap_to(self.scroll_id.clone(), scrollable::RelativeOffset::END)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::LauncherHovered(offset) => {
                self.hover_offset = Some(Vector::new(offset.x, offset.y));
                Task::none()
            }
            Message::LauncherPressed => {
                let size = self.launcher.size();
                let offset = self
                    .hover_offset
                    .unwrap_or(Vector::new(size.width / 2.0, size.height / 2.0));
                let pointer = self.launcher.position() + offset;
                self.last_pointer = pointer;
                self.launcher.pointer_down(pointer);
                Task::none()
            }
            Message::PointerMoved(position) => {
                self.last_pointer = position;
                self.launcher.pointer_moved(position);
                Task::none()
            }
            Message::PointerReleased => {
                let was_dragging = self.launcher.is_dragging();
                let gesture = self.launcher.pointer_up(self.last_pointer);
                if was_dragging {
                    // A drag clamped at an edge leaves the cursor off the launcher.
                    self.hover_offset = self.pointer_over_launcher();
                }

                if gesture == Gesture::Click && self.launcher.is_open() {
                    Task::batch([text_input::focus(self.input_id.clone()), self.scroll_to_latest()])
                } else {
                    Task::none()
                }
            }
            Message::PointerLeft => {
                if self.launcher.is_dragging() {
                    tracing::debug!("pointer left the window mid-drag");
                    self.launcher.cancel_drag();
                }
                Task::none()
            }
            Message::ViewportResized(size) => {
                self.launcher.set_viewport(size);
                Task::none()
            }
            Message::ClosePanel => {
                self.launcher.close();
                Task::none()
            }
            Message::ClearHistory => {
                self.store.reset();
                Task::none()
            }
            Message::InputChanged(value) => {
                self.input = value;
                Task::none()
            }
            Message::Submit => {
                if !self.can_send() {
                    return Task::none();
                }

                let attachments = std::mem::take(&mut self.pending_attachments);
                let turn = match self.store.begin_turn(&self.input, attachments) {
                    Ok(turn) => turn,
                    Err(rejected) => {
                        tracing::debug!("send rejected: {rejected}");
                        return Task::none();
                    }
                };

                self.input.clear();
                self.loading_frame = 0;

                let mut request = turn.request.clone();
                self.in_flight = Some(turn);

                let client = self.client.clone();
                let uploader = self.uploader.clone();
                let reply = Task::future(async move {
                    uploader.publish(&mut request.attachments).await;
                    Message::ReplyReceived(client.complete(&request).await)
                });

                Task::batch([self.scroll_to_latest(), reply])
            }
            Message::ReplyReceived(result) => {
                match self.in_flight.take() {
                    Some(turn) => self.store.finish_turn(turn, result),
                    None => tracing::warn!("reply arrived with no turn in flight"),
                }
                self.scroll_to_latest()
            }
            Message::AttachRequested => {
                if self.store.is_waiting_for_reply() {
                    return Task::none();
                }
                Task::future(pick_files())
            }
            Message::FilesPicked(files) => {
                self.pending_attachments.extend(files);
                Task::none()
            }
            Message::RemoveAttachment(index) => {
                if index < self.pending_attachments.len() {
                    self.pending_attachments.remove(index);
                }
                Task::none()
            }
            Message::Tick => {
                if self.store.is_waiting_for_reply() {
                    self.loading_frame = (self.loading_frame + 1) % SPINNER_FRAMES.len();
                }
                Task::none()
            }
        }
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![event::listen_with(window_event)];

        if self.listens_for_drag() {
            subscriptions.push(event::listen_with(drag_event));
        }

        if self.store.is_waiting_for_reply() {
            subscriptions.push(time::every(Duration::from_millis(80)).map(|_| Message::Tick));
        }

        Subscription::batch(subscriptions)
    }

    pub fn view(&self) -> Element<'_, Message> {
        let launcher = positioned(self.launcher_button(), self.launcher.position());

        if !self.launcher.is_open() {
            return launcher;
        }

        // The panel stays where it was while the launcher is being dragged.
        let anchor = match self.launcher.drag_state() {
            Some(drag) => drag.start - drag.grab_offset,
            None => self.launcher.position(),
        };
        let placement = place_panel(
            anchor,
            self.launcher.size(),
            self.launcher.viewport(),
            self.panel_size,
            self.metrics,
        );

        stack![positioned(self.panel(), placement.origin), launcher]
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn launcher_button(&self) -> Element<'_, Message> {
        let size = self.launcher.size();
        let label = if self.launcher.is_open() { "×" } else { "Chat" };

        let face = container(text(label).size(16))
            .width(Length::Fixed(size.width))
            .height(Length::Fixed(size.height))
            .align_x(alignment::Horizontal::Center)
            .align_y(alignment::Vertical::Center)
            .style(move |theme: &Theme| {
                let palette = theme.extended_palette();
                container::Style {
                    background: Some(palette.primary.strong.color.into()),
                    text_color: Some(palette.primary.strong.text),
                    border: Border {
                        radius: (size.width / 2.0).into(),
                        ..Border::default()
                    },
                    ..container::Style::default()
                }
            });

        mouse_area(face)
            .on_press(Message::LauncherPressed)
            .on_move(Message::LauncherHovered)
            .interaction(mouse::Interaction::Pointer)
            .into()
    }

    fn panel(&self) -> Element<'_, Message> {
        let waiting = self.store.is_waiting_for_reply();

        let header = container(
            row![
                text(self.title.as_str()).size(18),
                horizontal_space(),
                button(text("Clear").size(13))
                    .on_press(Message::ClearHistory)
                    .style(button::secondary),
                button(text("×").size(13))
                    .on_press(Message::ClosePanel)
                    .style(button::secondary),
            ]
            .spacing(8)
            .align_y(alignment::Vertical::Center),
        )
        .padding(12)
        .width(Length::Fill)
        .style(|theme: &Theme| {
            let palette = theme.extended_palette();
            container::Style {
                background: Some(palette.primary.base.color.into()),
                text_color: Some(palette.primary.base.text),
                ..container::Style::default()
            }
        });

        let history = scrollable(
            Column::with_children(self.store.messages().iter().map(bubble))
                .spacing(12)
                .padding(12),
        )
        .id(self.scroll_id.clone())
        .height(Length::Fill);

        let mut input = text_input("Type your message...", &self.input)
            .id(self.input_id.clone())
            .padding(10)
            .size(15);
        if !waiting {
            input = input.on_input(Message::InputChanged).on_submit(Message::Submit);
        }

        let attach_label = match self.pending_attachments.len() {
            0 => "Attach".to_string(),
            n => format!("Attach ({n})"),
        };
        let attach = button(text(attach_label).size(13))
            .on_press_maybe((!waiting).then_some(Message::AttachRequested))
            .style(button::secondary);

        let send: Element<'_, Message> = if waiting {
            text(SPINNER_FRAMES[self.loading_frame]).size(22).into()
        } else {
            button(text("Send").size(14))
                .on_press_maybe(self.can_send().then_some(Message::Submit))
                .into()
        };

        let input_row = row![attach, input, send]
            .spacing(8)
            .padding(10)
            .align_y(alignment::Vertical::Center);

        let mut body = column![header, history].height(Length::Fill);
        if !self.pending_attachments.is_empty() {
            body = body.push(self.attachment_chips());
        }
        body = body.push(input_row);

        container(body)
            .width(Length::Fixed(self.panel_size.width))
            .height(Length::Fixed(self.panel_size.height))
            .style(container::bordered_box)
            .into()
    }

    fn attachment_chips(&self) -> Element<'_, Message> {
        let chips = self.pending_attachments.iter().enumerate().map(|(index, file)| {
            container(
                row![
                    text(chip_label(&file.name)).size(12),
                    button(text("×").size(12))
                        .on_press(Message::RemoveAttachment(index))
                        .padding(0)
                        .style(button::text),
                ]
                .spacing(4)
                .align_y(alignment::Vertical::Center),
            )
            .padding([2, 6])
            .style(container::rounded_box)
            .into()
        });

        Row::with_children(chips).spacing(6).padding([6, 10]).into()
    }
}

fn bubble(message: &ChatMessage) -> Element<'_, Message> {
    let user = message.is_user();

    let mut body = column![text(message.content.as_str()).size(15)].spacing(4);
    for file in &message.attachments {
        body = body.push(text(format!("📎 {}", file.name)).size(12));
    }
    body = body.push(text(message.time_label()).size(11));

    let bubble = container(body)
        .padding(10)
        .max_width(260.0)
        .style(move |theme: &Theme| {
            let palette = theme.extended_palette();
            let pair = if user { palette.primary.base } else { palette.background.weak };
            container::Style {
                background: Some(pair.color.into()),
                text_color: Some(pair.text),
                border: Border {
                    radius: 8.0.into(),
                    ..Border::default()
                },
                ..container::Style::default()
            }
        });

    let align = if user {
        alignment::Horizontal::Right
    } else {
        alignment::Horizontal::Left
    };

    container(bubble).width(Length::Fill).align_x(align).into()
}

/// Fills the layer and offsets `content` so its top-left sits at `origin`.
fn positioned<'a>(content: impl Into<Element<'a, Message>>, origin: Point) -> Element<'a, Message> {
    container(content)
        .padding(Padding {
            top: origin.y,
            left: origin.x,
            right: 0.0,
            bottom: 0.0,
        })
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Shortens long file names to keep chips narrow.
pub fn chip_label(name: &str) -> String {
    if name.width() <= CHIP_MAX_WIDTH {
        return name.to_string();
    }

    let mut label = String::new();
    let mut used = 0;
    for ch in name.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > CHIP_KEEP_WIDTH {
            break;
        }
        used += w;
        label.push(ch);
    }
    label.push_str("...");
    label
}

async fn pick_files() -> Message {
    let Some(handles) = rfd::AsyncFileDialog::new()
        .set_title("Attach files")
        .pick_files()
        .await
    else {
        return Message::FilesPicked(Vec::new());
    };

    let mut files = Vec::with_capacity(handles.len());
    for handle in handles {
        match Attachment::from_path(handle.path()).await {
            Ok(file) => files.push(file),
            Err(e) => tracing::warn!("skipping attachment: {e:#}"),
        }
    }
    Message::FilesPicked(files)
}

fn window_event(event: IcedEvent, _status: event::Status, _id: window::Id) -> Option<Message> {
    match event {
        IcedEvent::Window(window::Event::Opened { size, .. }) | IcedEvent::Window(window::Event::Resized(size)) => {
            Some(Message::ViewportResized(size))
        }
        IcedEvent::Keyboard(keyboard::Event::KeyPressed {
            key: keyboard::Key::Named(keyboard::key::Named::Escape),
            ..
        }) => Some(Message::ClosePanel),
        _ => None,
    }
}

fn drag_event(event: IcedEvent, _status: event::Status, _id: window::Id) -> Option<Message> {
    match event {
        IcedEvent::Mouse(mouse::Event::CursorMoved { position }) => Some(Message::PointerMoved(position)),
        IcedEvent::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => Some(Message::PointerReleased),
        IcedEvent::Mouse(mouse::Event::CursorLeft) => Some(Message::PointerLeft),
        _ => None,
    }
}
