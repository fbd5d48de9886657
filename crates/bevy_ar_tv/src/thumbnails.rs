//! Thumbnail strip along the bottom of the window.
//!
//! Pressing a thumbnail only selects its video; the next tap on the screen
//! decides what plays.

use ar_tv::VideoId;
use bevy::prelude::*;

use crate::{ArTv, SelectVideo};

pub const THUMB_WIDTH: f32 = 160.0;
pub const THUMB_HEIGHT: f32 = 90.0;

const SELECTED_OUTLINE: Color = Color::srgb(1.0, 0.8, 0.2);

#[derive(Component, Debug, Clone)]
pub struct Thumbnail(pub VideoId);

#[derive(Component)]
pub struct ThumbnailLabel;

#[derive(Debug, Clone)]
pub struct ThumbnailSlot {
    pub video: VideoId,
    pub button: Entity,
    pub label: Entity,
}

#[derive(Debug, Clone)]
pub struct ThumbnailStrip {
    pub root: Entity,
    pub slots: Vec<ThumbnailSlot>,
}

/// Spawn one button per video. The strip background has its own
/// [`Interaction`], so presses between buttons count as UI and never become
/// screen taps.
pub fn spawn_thumbnail_strip(commands: &mut Commands, videos: &[VideoId]) -> ThumbnailStrip {
    let root = commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                bottom: Val::Px(0.0),
                height: Val::Px(THUMB_HEIGHT + 24.0),
                flex_direction: FlexDirection::Row,
                align_items: AlignItems::Center,
                column_gap: Val::Px(10.0),
                padding: UiRect::horizontal(Val::Px(12.0)),
                overflow: Overflow::scroll_x(),
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.55)),
            Interaction::default(),
            Name::new("thumbnailStrip"),
        ))
        .id();

    let slots = videos
        .iter()
        .map(|video| {
            let label = commands
                .spawn((
                    Text::new(format!("Video {video}")),
                    TextFont {
                        font_size: 13.0,
                        ..default()
                    },
                    TextColor(Color::WHITE),
                    ThumbnailLabel,
                ))
                .id();
            let button = commands
                .spawn((
                    Button,
                    Thumbnail(video.clone()),
                    Node {
                        width: Val::Px(THUMB_WIDTH),
                        height: Val::Px(THUMB_HEIGHT),
                        flex_shrink: 0.0,
                        justify_content: JustifyContent::Center,
                        align_items: AlignItems::End,
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.15, 0.15, 0.18)),
                    Outline::new(Val::Px(3.0), Val::Px(1.0), Color::NONE),
                    ChildOf(root),
                ))
                .add_child(label)
                .id();
            ThumbnailSlot {
                video: video.clone(),
                button,
                label,
            }
        })
        .collect();

    ThumbnailStrip { root, slots }
}

pub fn thumbnail_clicks(
    thumbnails: Query<(&Interaction, &Thumbnail), Changed<Interaction>>,
    mut select: MessageWriter<SelectVideo>,
) {
    for (interaction, thumbnail) in &thumbnails {
        if *interaction == Interaction::Pressed {
            select.write(SelectVideo(thumbnail.0.clone()));
        }
    }
}

/// Outline the thumbnail of the selected video.
pub fn highlight_selection(ar: Res<ArTv>, mut thumbnails: Query<(&Thumbnail, &mut Outline)>) {
    let selected = ar.0.selected();
    for (thumbnail, mut outline) in &mut thumbnails {
        let color = if selected == Some(&thumbnail.0) {
            SELECTED_OUTLINE
        } else {
            Color::NONE
        };
        if outline.color != color {
            outline.color = color;
        }
    }
}
