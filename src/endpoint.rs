/// Address of a device endpoint.
///
/// Bit 7 gives the direction (set for IN, device to host) and the low four
/// bits the endpoint number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint(u8);

const DIRECTION_IN: u8 = 0x80;

impl Endpoint {
    /// Wrap a raw endpoint address.
    #[must_use]
    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    /// IN endpoint with the given number.
    #[must_use]
    pub const fn input(number: u8) -> Self {
        Self(DIRECTION_IN | (number & 0x0F))
    }

    /// The raw endpoint address.
    #[inline]
    #[must_use]
    pub fn address(self) -> u8 {
        self.0
    }

    /// Endpoint number, without the direction bit.
    #[inline]
    #[must_use]
    pub fn number(self) -> u8 {
        self.0 & 0x0F
    }

    /// Whether data flows from the device to the host.
    #[inline]
    #[must_use]
    pub fn is_in(self) -> bool {
        !self.is_out()
    }

    /// Whether data flows from the host to the device.
    #[inline]
    #[must_use]
    pub fn is_out(self) -> bool {
        self.0 & DIRECTION_IN == 0
    }
}

impl From<u8> for Endpoint {
    fn from(address: u8) -> Self {
        Self(address)
    }
}

impl From<Endpoint> for u8 {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}
