//! Preselected books offered by the reader.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: &'static str,
    pub id: &'static str,
}

const fn entry(title: &'static str, id: &'static str) -> CatalogEntry {
    CatalogEntry { title, id }
}

pub const PRESELECTED: &[CatalogEntry] = &[
    entry("Alice's Adventures in Wonderland by Lewis Carroll", "11"),
    entry("Pride and Prejudice by Jane Austen", "1342"),
    entry("The Adventures of Sherlock Holmes by Arthur Conan Doyle", "1661"),
    entry("A Tale of Two Cities by Charles Dickens", "98"),
    entry("Moby Dick; or The Whale by Herman Melville", "2701"),
    entry("Frankenstein; Or, The Modern Prometheus by Mary Shelley", "84"),
    entry("Dracula by Bram Stoker", "345"),
    entry("The Picture of Dorian Gray by Oscar Wilde", "174"),
    entry("The Great Gatsby by F. Scott Fitzgerald", "64317"),
    entry("Jane Eyre by Charlotte Brontë", "1260"),
    entry("War and Peace by Leo Tolstoy", "2600"),
    entry("The Iliad by Homer", "6130"),
    entry("The Odyssey by Homer", "1727"),
    entry("Adventures of Huckleberry Finn by Mark Twain", "76"),
    entry("The Adventures of Tom Sawyer by Mark Twain", "74"),
    entry("Treasure Island by Robert Louis Stevenson", "120"),
    entry("The Call of the Wild by Jack London", "215"),
    entry("Anne of Green Gables by L. M. Montgomery", "45"),
    entry("Little Women by Louisa May Alcott", "514"),
    entry("The Importance of Being Earnest by Oscar Wilde", "844"),
    entry("Metamorphosis by Franz Kafka", "5200"),
    entry("The Yellow Wallpaper by Charlotte Perkins Gilman", "1952"),
    entry("A Christmas Carol by Charles Dickens", "46"),
    entry("Great Expectations by Charles Dickens", "1400"),
    entry("The Scarlet Letter by Nathaniel Hawthorne", "25344"),
    entry("Wuthering Heights by Emily Brontë", "768"),
    entry("Don Quixote by Miguel de Cervantes Saavedra", "996"),
    entry("The Count of Monte Cristo by Alexandre Dumas", "1184"),
    entry("Grimms' Fairy Tales by Jacob Grimm and Wilhelm Grimm", "2591"),
    entry("A Modest Proposal by Jonathan Swift", "1080"),
    entry("The Republic by Plato", "1497"),
    entry("The Prince by Niccolò Machiavelli", "1232"),
    entry("Ulysses by James Joyce", "4300"),
    entry("Siddhartha by Hermann Hesse", "2500"),
    entry("The Time Machine by H. G. Wells", "35"),
    entry("The War of the Worlds by H. G. Wells", "36"),
    entry("Heart of Darkness by Joseph Conrad", "219"),
    entry("The Wonderful Wizard of Oz by L. Frank Baum", "55"),
    entry("Relativity: The Special and General Theory by Albert Einstein", "5001"),
    entry("The Souls of Black Folk by W. E. B. Du Bois", "408"),
];

pub fn title_for(book_id: &str) -> Option<&'static str> {
    PRESELECTED.iter().find(|b| b.id == book_id).map(|b| b.title)
}
