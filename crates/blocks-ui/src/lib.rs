#![allow(non_snake_case)]
//! Block constructors.
//!
//! Each function returns an intrinsic `Element`; layout and style props are
//! set through `ElementExt`:
//!
//! ```rust,ignore
//! VStack(vec![
//!     Text("Scores").size(TextSize::XLarge),
//!     Button("Refresh", move || refresh()).appearance(ButtonAppearance::Primary),
//! ])
//! .padding(Padding::Medium)
//! .gap(Padding::Small)
//! ```

use blocks_core::{Element, Handler};

pub fn VStack(children: Vec<Element>) -> Element {
    Element::intrinsic("vstack").with_children(children)
}

pub fn HStack(children: Vec<Element>) -> Element {
    Element::intrinsic("hstack").with_children(children)
}

/// Children are layered back to front.
pub fn ZStack(children: Vec<Element>) -> Element {
    Element::intrinsic("zstack").with_children(children)
}

pub fn Text(text: impl Into<String>) -> Element {
    Element::intrinsic("text").prop("text", text.into())
}

pub fn Button(label: impl Into<String>, on_press: impl Fn() + 'static) -> Element {
    ButtonWith(label, Handler::new(move |_| on_press()))
}

/// A button whose handler receives the event payload, or is async.
pub fn ButtonWith(label: impl Into<String>, on_press: Handler) -> Element {
    Element::intrinsic("button")
        .prop("text", label.into())
        .on("onPress", on_press)
}

pub fn Image(
    url: impl Into<String>,
    description: impl Into<String>,
    width: u32,
    height: u32,
) -> Element {
    Element::intrinsic("image")
        .prop("url", url.into())
        .prop("description", description.into())
        .prop("imageWidth", width)
        .prop("imageHeight", height)
}

pub fn Spacer() -> Element {
    Element::intrinsic("spacer")
}

pub fn Icon(name: impl Into<String>) -> Element {
    Element::intrinsic("icon").prop("name", name.into())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    None,
    XSmall,
    Small,
    Medium,
    Large,
}

impl Padding {
    pub fn as_str(self) -> &'static str {
        match self {
            Padding::None => "none",
            Padding::XSmall => "xsmall",
            Padding::Small => "small",
            Padding::Medium => "medium",
            Padding::Large => "large",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Start,
    Center,
    End,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Start => "start",
            Alignment::Center => "center",
            Alignment::End => "end",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextSize {
    XSmall,
    Small,
    Medium,
    Large,
    XLarge,
    XXLarge,
}

impl TextSize {
    pub fn as_str(self) -> &'static str {
        match self {
            TextSize::XSmall => "xsmall",
            TextSize::Small => "small",
            TextSize::Medium => "medium",
            TextSize::Large => "large",
            TextSize::XLarge => "xlarge",
            TextSize::XXLarge => "xxlarge",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextWeight {
    Regular,
    Bold,
}

impl TextWeight {
    pub fn as_str(self) -> &'static str {
        match self {
            TextWeight::Regular => "regular",
            TextWeight::Bold => "bold",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAppearance {
    Primary,
    Secondary,
    Plain,
    Destructive,
}

impl ButtonAppearance {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonAppearance::Primary => "primary",
            ButtonAppearance::Secondary => "secondary",
            ButtonAppearance::Plain => "plain",
            ButtonAppearance::Destructive => "destructive",
        }
    }
}

/// Typed style props. Anything not covered here can still be set with
/// `Element::prop`.
pub trait ElementExt: Sized {
    fn padding(self, padding: Padding) -> Self;
    fn gap(self, gap: Padding) -> Self;
    fn alignment(self, alignment: Alignment) -> Self;
    fn size(self, size: TextSize) -> Self;
    fn weight(self, weight: TextWeight) -> Self;
    fn color(self, color: impl Into<String>) -> Self;
    fn appearance(self, appearance: ButtonAppearance) -> Self;
    /// CSS-like length, e.g. `"50%"` or `"120px"`.
    fn width(self, width: impl Into<String>) -> Self;
    fn grow(self) -> Self;
}

impl ElementExt for Element {
    fn padding(self, padding: Padding) -> Self {
        self.prop("padding", padding.as_str())
    }

    fn gap(self, gap: Padding) -> Self {
        self.prop("gap", gap.as_str())
    }

    fn alignment(self, alignment: Alignment) -> Self {
        self.prop("alignment", alignment.as_str())
    }

    fn size(self, size: TextSize) -> Self {
        self.prop("size", size.as_str())
    }

    fn weight(self, weight: TextWeight) -> Self {
        self.prop("weight", weight.as_str())
    }

    fn color(self, color: impl Into<String>) -> Self {
        self.prop("color", color.into())
    }

    fn appearance(self, appearance: ButtonAppearance) -> Self {
        self.prop("appearance", appearance.as_str())
    }

    fn width(self, width: impl Into<String>) -> Self {
        self.prop("width", width.into())
    }

    fn grow(self) -> Self {
        self.prop("grow", true)
    }
}
