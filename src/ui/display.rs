//! SSD1306 OLED rendering.
//!
//! The main screen is drawn incrementally: the dispatch engine's effects name
//! a single button box, the bank label or the status line, and only that
//! region is repainted and flushed. `draw_main` repaints everything, used at
//! boot and when the menu closes.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle, RoundedRectangle};
use embedded_graphics::text::Text;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use crate::config::NUM_BUTTONS;
use crate::menu::{Menu, Settings, MENU_ITEMS};
use crate::store::{ButtonMode, ConfigStore};
use crate::ui::layout;
use core::fmt::Write;

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Initialise the SSD1306 display and clear the screen.
pub fn init<I2C>(i2c: I2C) -> Display<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    let _ = display.init();
    display.clear_buffer();
    let _ = display.flush();
    display
}

fn text_style() -> embedded_graphics::mono_font::MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn inverted_text_style() -> embedded_graphics::mono_font::MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::Off)
        .build()
}

/// Repaint the full main screen from the store and toggle state.
pub fn draw_main<I2C>(display: &mut Display<I2C>, store: &ConfigStore, lit: &[bool; NUM_BUTTONS])
where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();
    paint_bank_label(display, store.current_bank());
    for index in 0..NUM_BUTTONS {
        let mode = store.get(store.current_bank() as usize, index).mode;
        paint_button_box(display, store, index, lit[index], mode);
    }
    let _ = display.flush();
}

/// Repaint a single button box.
pub fn draw_button_box<I2C>(
    display: &mut Display<I2C>,
    store: &ConfigStore,
    index: usize,
    lit: bool,
    mode: ButtonMode,
) where
    I2C: embedded_hal::i2c::I2c,
{
    paint_button_box(display, store, index, lit, mode);
    let _ = display.flush();
}

/// Repaint the bank label line.
pub fn draw_bank_label<I2C>(display: &mut Display<I2C>, bank: u8)
where
    I2C: embedded_hal::i2c::I2c,
{
    paint_bank_label(display, bank);
    let _ = display.flush();
}

/// Show a transient status message on the bottom line.
pub fn draw_status<I2C>(display: &mut Display<I2C>, text: &str)
where
    I2C: embedded_hal::i2c::I2c,
{
    clear_status_region(display);
    let _ = Text::new(text, Point::new(2, layout::STATUS_LINE_Y), text_style()).draw(display);
    let _ = display.flush();
}

/// Blank the status line after the banner expires.
pub fn clear_status<I2C>(display: &mut Display<I2C>)
where
    I2C: embedded_hal::i2c::I2c,
{
    clear_status_region(display);
    let _ = display.flush();
}

/// Render the settings menu overlay.
pub fn draw_menu<I2C>(
    display: &mut Display<I2C>,
    menu: &Menu,
    settings: &Settings,
    store: &ConfigStore,
) where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();

    let _ = Text::new("Settings", Point::new(0, 10), text_style()).draw(display);

    for (row, item) in MENU_ITEMS.iter().enumerate() {
        let marker = if row == menu.selected() { ">" } else { " " };
        let mut line: heapless::String<24> = heapless::String::new();
        let _ = write!(
            line,
            "{} {:<10} {}",
            marker,
            item.label,
            Menu::value_text(row, settings, store)
        );
        let y = 24 + (row as i32 * 10);
        let _ = Text::new(line.as_str(), Point::new(0, y), text_style()).draw(display);
    }

    let _ = display.flush();
}

/// Map the 0-255 brightness setting onto the panel's contrast presets.
pub fn set_brightness<I2C>(display: &mut Display<I2C>, value: u8)
where
    I2C: embedded_hal::i2c::I2c,
{
    let brightness = match value {
        0..=50 => Brightness::DIMMEST,
        51..=101 => Brightness::DIM,
        102..=152 => Brightness::NORMAL,
        153..=203 => Brightness::BRIGHT,
        _ => Brightness::BRIGHTEST,
    };
    let _ = display.set_brightness(brightness);
}

fn paint_bank_label<I2C>(display: &mut Display<I2C>, bank: u8)
where
    I2C: embedded_hal::i2c::I2c,
{
    let band = Rectangle::new(
        Point::new(0, 0),
        Size::new(layout::SCREEN_WIDTH as u32, 16),
    );
    let _ = band
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(display);

    let mut label: heapless::String<8> = heapless::String::new();
    let _ = write!(label, "Bank {}", bank + 1);
    let _ = Text::new(
        label.as_str(),
        Point::new(2, layout::BANK_LABEL_Y),
        text_style(),
    )
    .draw(display);
}

/// Box outline shape encodes the mode: square corners for momentary, rounded
/// for toggle. A lit box is filled with the value number inverted.
fn paint_button_box<I2C>(
    display: &mut Display<I2C>,
    store: &ConfigStore,
    index: usize,
    lit: bool,
    mode: ButtonMode,
) where
    I2C: embedded_hal::i2c::I2c,
{
    let rect = Rectangle::new(
        Point::new(layout::button_box_x(index), layout::BUTTON_ROW_Y),
        Size::new(layout::BUTTON_BOX_WIDTH as u32, layout::BUTTON_BOX_HEIGHT as u32),
    );

    let _ = rect
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(display);

    let style = if lit {
        PrimitiveStyle::with_fill(BinaryColor::On)
    } else {
        PrimitiveStyle::with_stroke(BinaryColor::On, 1)
    };
    match mode {
        ButtonMode::Momentary => {
            let _ = rect.into_styled(style).draw(display);
        }
        ButtonMode::Toggle => {
            let _ = RoundedRectangle::with_equal_corners(rect, Size::new(4, 4))
                .into_styled(style)
                .draw(display);
        }
    }

    let mut value: heapless::String<4> = heapless::String::new();
    let _ = write!(
        value,
        "{}",
        store.get(store.current_bank() as usize, index).value
    );
    let text_x = layout::button_box_x(index) + 4;
    let text_y = layout::BUTTON_ROW_Y + 13;
    let style = if lit { inverted_text_style() } else { text_style() };
    let _ = Text::new(value.as_str(), Point::new(text_x, text_y), style).draw(display);
}

fn clear_status_region<I2C>(display: &mut Display<I2C>)
where
    I2C: embedded_hal::i2c::I2c,
{
    let band = Rectangle::new(
        Point::new(0, layout::STATUS_LINE_Y - 10),
        Size::new(layout::SCREEN_WIDTH as u32, 12),
    );
    let _ = band
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(display);
}
