use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use gpui::*;
use gpui_component::{
    ActiveTheme, Icon, IconName, h_flex, label::Label, text::TextView, v_flex,
    v_virtual_list,
};

use geminis_chat::{Role, RowView, TurnId};

use crate::chat::scroll_manager::ScrollManager;

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const ROLE_ICON_SIZE: Pixels = px(28.);
const ROLE_ICON_GAP: Pixels = px(12.);
const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const USER_BUBBLE_PADDING_X: Pixels = px(14.);
const USER_BUBBLE_PADDING_Y: Pixels = px(10.);
const THINKING_ROW_HEIGHT: Pixels = px(28.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;
const MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES: usize = 128 * 1024;

/// One virtual-list entry: a transcript turn or the trailing thinking indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListRow {
    Turn(RowView),
    Thinking(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Turn(TurnId),
    Thinking,
}

impl ListRow {
    fn key(&self) -> RowKey {
        match self {
            Self::Turn(row) => RowKey::Turn(row.id),
            Self::Thinking(_) => RowKey::Thinking,
        }
    }
}

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

pub struct MessageList {
    rows: Vec<ListRow>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_manager: ScrollManager,
    size_cache: HashMap<RowKey, SizeCacheEntry>,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            rows: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_manager: ScrollManager::new(),
            size_cache: HashMap::new(),
            content_width: None,
        }
    }

    /// Replaces the visible rows. Growth keeps the view pinned to the newest turn
    /// unless the user scrolled away from it.
    pub fn set_rows(
        &mut self,
        turns: Vec<RowView>,
        thinking: Option<String>,
        cx: &mut Context<Self>,
    ) {
        let mut rows = turns.into_iter().map(ListRow::Turn).collect::<Vec<_>>();
        rows.extend(thinking.map(ListRow::Thinking));

        if rows == self.rows {
            return;
        }

        let grew = rows.len() > self.rows.len();
        self.rows = rows;
        self.rebuild_item_sizes();

        if grew {
            self.scroll_manager.request_scroll_to_bottom_if_following();
        }

        cx.notify();
    }

    /// Forces the next layout to land on the newest row, e.g. after the user sends.
    pub fn request_scroll_to_bottom(&mut self, cx: &mut Context<Self>) {
        self.scroll_manager.request_scroll_to_bottom();
        cx.notify();
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let mut active_keys = HashSet::with_capacity(self.rows.len());
        let mut sizes = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let next_hash = layout_hash(row);
            let estimated_height = estimate_row_height(row, content_width);

            let entry = self.size_cache.entry(row.key()).or_insert(SizeCacheEntry {
                layout_hash: next_hash,
                height: estimated_height,
                measured: false,
            });

            if entry.layout_hash != next_hash {
                entry.layout_hash = next_hash;
                entry.height = estimated_height;
                entry.measured = false;
            } else if !entry.measured {
                entry.height = estimated_height;
            }

            sizes.push(size(px(0.), entry.height));
            active_keys.insert(row.key());
        }

        self.size_cache.retain(|key, _| active_keys.contains(key));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(row) = self.rows.get(index).cloned() else {
                continue;
            };

            let mut element = self.render_row(&row, cx);
            let measured_height = element.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&row.key()) else {
                continue;
            };
            if !entry.measured || pixels_changed(entry.height, measured_height) {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_row(&self, row: &ListRow, cx: &mut Context<Self>) -> AnyElement {
        match row {
            ListRow::Turn(turn) if turn.role == Role::User => self.render_user_row(turn, cx),
            ListRow::Turn(turn) => self.render_assistant_row(turn, cx),
            ListRow::Thinking(label) => self.render_thinking_row(label, cx),
        }
    }

    fn render_user_row(&self, turn: &RowView, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        // Keep a blank bubble at one line of height.
        let content = if turn.content.is_empty() {
            " ".to_string()
        } else {
            turn.content.clone()
        };

        h_flex()
            .w_full()
            .justify_end()
            .items_start()
            .gap(ROLE_ICON_GAP)
            .child(
                div()
                    .max_w(USER_BUBBLE_MAX_WIDTH)
                    .px(USER_BUBBLE_PADDING_X)
                    .py(USER_BUBBLE_PADDING_Y)
                    .rounded_lg()
                    .bg(theme.accent)
                    .text_color(theme.accent_foreground)
                    .child(Label::new(content).text_sm()),
            )
            .child(
                div()
                    .size(ROLE_ICON_SIZE)
                    .flex_shrink_0()
                    .rounded_full()
                    .bg(theme.primary)
                    .text_color(theme.primary_foreground)
                    .text_xs()
                    .flex()
                    .items_center()
                    .justify_center()
                    .child(turn.sender.clone()),
            )
            .into_any_element()
    }

    fn render_assistant_row(&self, turn: &RowView, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        h_flex()
            .w_full()
            .items_start()
            .gap(ROLE_ICON_GAP)
            .child(assistant_icon(theme.primary, theme.muted))
            .child(
                v_flex()
                    .flex_1()
                    .min_w_0()
                    .gap_2()
                    .child(
                        Label::new(turn.sender.clone())
                            .text_xs()
                            .text_color(theme.foreground.opacity(0.5)),
                    )
                    .child(render_assistant_content(turn)),
            )
            .into_any_element()
    }

    fn render_thinking_row(&self, label: &str, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        h_flex()
            .id("thinking-indicator")
            .w_full()
            .h(THINKING_ROW_HEIGHT)
            .items_center()
            .gap(ROLE_ICON_GAP)
            .child(assistant_icon(theme.primary, theme.muted))
            .child(
                Label::new(label.to_string())
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.65)),
            )
            .into_any_element()
    }
}

fn assistant_icon(color: Hsla, background: Hsla) -> impl IntoElement {
    div()
        .size(ROLE_ICON_SIZE)
        .flex_shrink_0()
        .rounded_full()
        .bg(background)
        .flex()
        .items_center()
        .justify_center()
        .child(Icon::new(IconName::Bot).size(px(16.)).text_color(color))
}

fn render_assistant_content(turn: &RowView) -> AnyElement {
    // An empty reply is still a turn; render it as an empty line.
    if turn.content.trim().is_empty()
        || turn.content.len() > MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES
    {
        return Label::new(turn.content.clone()).text_sm().into_any_element();
    }

    let markdown_id = ElementId::Name(SharedString::from(format!(
        "assistant-markdown-{}",
        turn.id.0
    )));

    TextView::markdown(markdown_id, turn.content.clone())
        .selectable(true)
        .into_any_element()
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.scroll_manager.update_follow_state();
        self.scroll_manager.apply_pending_scroll();

        v_flex().size_full().min_h_0().child(
            v_virtual_list(
                cx.entity().clone(),
                "message-list",
                self.item_sizes.clone(),
                |this, visible_range, window, cx| {
                    this.update_content_width(cx);
                    this.measure_visible_items(visible_range.clone(), window, cx);
                    visible_range
                        .filter_map(|index| {
                            this.rows
                                .get(index)
                                .cloned()
                                .map(|row| this.render_row(&row, cx))
                        })
                        .collect::<Vec<_>>()
                },
            )
            .size_full()
            .px_4()
            .py_3()
            .gap_4()
            .track_scroll(self.scroll_manager.handle()),
        )
    }
}

fn layout_hash(row: &ListRow) -> u64 {
    let mut hasher = DefaultHasher::new();

    match row {
        ListRow::Turn(turn) => {
            hasher.write_u64(turn.id.0);
            hasher.write_u8(match turn.role {
                Role::User => 1,
                Role::Assistant => 2,
            });
            hasher.write(turn.sender.as_bytes());
            hasher.write(turn.content.as_bytes());
        }
        ListRow::Thinking(label) => {
            hasher.write_u8(0);
            hasher.write(label.as_bytes());
        }
    }

    hasher.finish()
}

fn estimate_row_height(row: &ListRow, content_width: Pixels) -> Pixels {
    let text_width = max_pixels(px(1.), content_width - ROLE_ICON_SIZE - ROLE_ICON_GAP);

    match row {
        ListRow::Turn(turn) if turn.role == Role::User => {
            let bubble_width = min_pixels(text_width, USER_BUBBLE_MAX_WIDTH);
            let inner_width = max_pixels(px(1.), bubble_width - USER_BUBBLE_PADDING_X * 2);
            let bubble_height =
                estimate_text_height(&turn.content, inner_width) + USER_BUBBLE_PADDING_Y * 2;
            max_pixels(bubble_height, ROLE_ICON_SIZE)
        }
        ListRow::Turn(turn) => {
            // Sender label, gap, then body.
            ESTIMATED_TEXT_LINE_HEIGHT + px(8.) + estimate_text_height(&turn.content, text_width)
        }
        ListRow::Thinking(_) => THINKING_ROW_HEIGHT,
    }
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let chars_per_line = (f32::from(width) / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(id: u64, role: Role, content: &str) -> ListRow {
        ListRow::Turn(RowView {
            id: TurnId::new(id),
            role,
            sender: "M".to_string(),
            content: content.to_string(),
        })
    }

    #[::core::prelude::v1::test]
    fn long_assistant_turns_estimate_taller_than_short_ones() {
        let width = px(400.);
        let short = estimate_row_height(&turn(1, Role::Assistant, "Hi"), width);
        let long = estimate_row_height(&turn(1, Role::Assistant, &"word ".repeat(400)), width);
        assert!(f32::from(long) > f32::from(short));
    }

    #[::core::prelude::v1::test]
    fn user_rows_are_never_shorter_than_the_avatar() {
        let height = estimate_row_height(&turn(0, Role::User, ""), px(400.));
        assert!(f32::from(height) >= f32::from(ROLE_ICON_SIZE));
    }

    #[::core::prelude::v1::test]
    fn layout_hash_tracks_content_and_identity() {
        let first = layout_hash(&turn(0, Role::User, "Hello"));
        assert_eq!(first, layout_hash(&turn(0, Role::User, "Hello")));
        assert_ne!(first, layout_hash(&turn(1, Role::User, "Hello")));
        assert_ne!(first, layout_hash(&turn(0, Role::User, "Hello!")));
        assert_ne!(
            layout_hash(&ListRow::Thinking("Gemini is thinking...".to_string())),
            first
        );
    }

    #[::core::prelude::v1::test]
    fn thinking_row_has_a_stable_key() {
        let row = ListRow::Thinking("Gemini is thinking...".to_string());
        assert_eq!(row.key(), RowKey::Thinking);
        assert_eq!(turn(3, Role::Assistant, "x").key(), RowKey::Turn(TurnId::new(3)));
    }
}
